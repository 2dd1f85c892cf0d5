//! Compiler orchestration: parse, check, generate.
//!
//! Parsing and generation stop at the first user error because the
//! later stages cannot work on a malformed tree. Checking is the
//! exception: it always finishes a full pass and the batch of
//! diagnostics becomes one fatal error here.

use crate::checker;
use crate::codegen_py;
use crate::error::{CoreError, InvalidSource};
use crate::parser;

/// The result of one successful compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationArtifact {
    pub python: String,
}

/// Compile pino source text to Python source text.
pub fn compile_python(source: &str) -> Result<CompilationArtifact, CoreError> {
    let program = parser::parse(source)?;

    let outcome = checker::check(&program);
    if !outcome.passed() {
        return Err(CoreError::InvalidSource(InvalidSource {
            diagnostics: outcome.diagnostics,
        }));
    }

    let python = codegen_py::generate(&program)?;
    Ok(CompilationArtifact { python })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_small_program_end_to_end() {
        let source = "\
fn print_character(name str, game str) {
  println(\"#name is a cool #game character\")
}

fn main {
  val game = readln()
  match game {
    when \"Crysis\", \"Halo\" {
      println(\"Good game!\")
    }
    else {
      println(\"#game is a decent game!\")
    }
  }
  var times = int(readln())
  if times {
    times = 5
  }
  for it in times {
    print_character(readln(), game)
  }
}

main()
";
        let artifact = compile_python(source).expect("compile");
        let python = &artifact.python;

        assert!(python.contains("def print_character(name, game):"));
        assert!(python.contains("print(f\"{name} is a cool {game} character\")"));
        assert!(python.contains("match game:"));
        assert!(python.contains("case \"Crysis\" | \"Halo\":"));
        assert!(python.contains("case _:"));
        assert!(python.contains("times = int(input())"));
        assert!(python.contains("for it in times:"));
        assert!(python.ends_with("main()\n"));
    }

    #[test]
    fn checker_failures_batch_into_one_error() {
        let source = "var x = 5\nvar x = 6\nprintln(mystery)";
        let err = compile_python(source).unwrap_err();
        match err {
            CoreError::InvalidSource(invalid) => {
                assert_eq!(invalid.diagnostics.len(), 2);
            }
            other => panic!("expected invalid source, got {other:?}"),
        }
    }

    #[test]
    fn parse_errors_stop_the_pipeline_immediately() {
        let err = compile_python("enum Color { red }").unwrap_err();
        assert!(matches!(err, CoreError::ParseError(_)));
    }

    #[test]
    fn lex_errors_carry_their_line() {
        let err = compile_python("var x = 1\nval s = \"oops").unwrap_err();
        assert!(matches!(err, CoreError::LexError { line: 2, .. }));
    }

    #[test]
    fn generation_errors_surface_after_a_clean_check() {
        let err = compile_python("for 2.5 { }").unwrap_err();
        assert!(matches!(err, CoreError::SemanticError(_)));
    }
}
