use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pino_core::compile_python;

/// pino to Python transpiler.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, help = "Input .pino file (defaults to stdin)")]
    input: Option<String>,

    #[arg(short, long, help = "Path of the generated file")]
    output: String,

    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "py",
        help = "Output format: py"
    )]
    emit: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let source = match cli.input {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read input file {path}"))?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    match cli.emit.as_str() {
        "py" => {
            let artifact = compile_python(&source)?;
            write_output(&cli.output, artifact.python.as_bytes())?;
        }
        other => return Err(anyhow::anyhow!("unsupported emit format: {other}")),
    }

    Ok(())
}

fn write_output(path: &str, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = PathBuf::from(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes).with_context(|| format!("failed to write output file {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn transpiles_a_file_to_python() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.pino");
        fs::write(&input_path, "var x = 5\nprintln(\"value #x\")").expect("write input");
        let output_path = dir.path().join("out.py");

        Command::cargo_bin("pino-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .success();

        let python = fs::read_to_string(&output_path).expect("read output");
        assert_eq!(python, "x = 5\nprint(f\"value {x}\")\n");
    }

    #[test]
    fn reads_source_from_stdin_when_no_input_is_given() {
        let dir = tempdir().expect("tempdir");
        let output_path = dir.path().join("out.py");

        Command::cargo_bin("pino-cli")
            .expect("binary exists")
            .arg("--output")
            .arg(&output_path)
            .write_stdin("println(\"hi\")")
            .assert()
            .success();

        let python = fs::read_to_string(&output_path).expect("read output");
        assert_eq!(python, "print(\"hi\")\n");
    }

    #[test]
    fn reports_batched_checker_failures() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.pino");
        fs::write(&input_path, "var x = 1\nvar x = 2\nprintln(mystery)").expect("write input");
        let output_path = dir.path().join("out.py");

        Command::cargo_bin("pino-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("2 problems found"))
            .stderr(predicate::str::contains("already been declared"));

        assert!(!output_path.exists(), "no output on failure");
    }

    #[test]
    fn reports_lex_errors_with_their_line() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.pino");
        fs::write(&input_path, "var ok = 1\nval s = \"oops").expect("write input");
        let output_path = dir.path().join("out.py");

        Command::cargo_bin("pino-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("lex error on line 2"));
    }

    #[test]
    fn rejects_unknown_emit_formats() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.pino");
        fs::write(&input_path, "var x = 1").expect("write input");

        Command::cargo_bin("pino-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(dir.path().join("out.wasm"))
            .arg("--emit")
            .arg("wasm")
            .assert()
            .failure()
            .stderr(predicate::str::contains("unsupported emit format"));
    }

    #[test]
    fn creates_missing_output_directories() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.pino");
        fs::write(&input_path, "var x = 1").expect("write input");
        let output_path = dir.path().join("nested/out/generated.py");

        Command::cargo_bin("pino-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .success();

        assert!(output_path.exists());
    }
}
