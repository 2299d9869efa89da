use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::assembly::{write_program, CompileOptions};
use crate::code_gen::{GeneratedCode, Generator};
use crate::common::{CompileError, Diagnostics};
use crate::parser::parse;

pub fn compile(source: &str, class_name: &str, diagnostics: &mut Diagnostics) -> Option<GeneratedCode> {
    let ast = parse(source, diagnostics);
    if diagnostics.has_errors() {
        return None;
    }
    tracing::trace!(?ast, "parsed");
    let code = Generator::new(class_name, diagnostics).generate(&ast);
    tracing::trace!("{}", code.listing.disassemble(class_name));
    Some(code)
}

pub fn program_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Main".to_string())
}

pub fn compile_file(
    path: &Path,
    output: &Path,
    options: &CompileOptions,
) -> Result<(PathBuf, GeneratedCode), CompileError> {
    let source = fs::read_to_string(path).map_err(|source| CompileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let name = program_name(path);
    let mut diagnostics = Diagnostics::new(&path.display().to_string()).with_source(&source);
    let code = match compile(&source, &name, &mut diagnostics) {
        Some(code) => code,
        None => {
            return Err(CompileError::Parse {
                path: path.to_path_buf(),
                count: diagnostics.error_count(),
            })
        }
    };

    let target = output.join(format!("{}.j", name));
    let create_error = |source| CompileError::Create {
        path: target.clone(),
        source,
    };
    let file = File::create(&target).map_err(create_error)?;
    write_program(&mut BufWriter::new(file), &code, options).map_err(create_error)?;
    tracing::info!(listing = %target.display(), "wrote listing");

    if diagnostics.has_errors() {
        return Err(CompileError::Generate {
            path: path.to_path_buf(),
            count: diagnostics.error_count(),
        });
    }
    Ok((target, code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_skip_generation() {
        let mut diagnostics = Diagnostics::quiet("bad");
        assert!(compile("if then", "Bad", &mut diagnostics).is_none());
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn generation_errors_still_produce_code() {
        let mut diagnostics = Diagnostics::quiet("semantic");
        let code = compile("x$ = 1\nprint 2", "Semantic", &mut diagnostics).unwrap();
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(code.class_name, "Semantic");
        assert!(!code.listing.is_empty());
    }

    #[test]
    fn program_name_is_file_stem() {
        assert_eq!(program_name(Path::new("dir/Hello.small")), "Hello");
    }

    #[test]
    fn listing_is_written_next_to_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Count.small");
        fs::write(&source, "i = 0 while i < 3 do print i i++ end").unwrap();
        let (target, code) = compile_file(&source, dir.path(), &CompileOptions::default()).unwrap();
        assert_eq!(target, dir.path().join("Count.j"));
        assert_eq!(code.max_locals, 2);
        let text = fs::read_to_string(target).unwrap();
        assert!(text.starts_with(".class public Count\n"));
    }

    #[test]
    fn missing_source_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = compile_file(&dir.path().join("nope.small"), dir.path(), &CompileOptions::default());
        assert!(matches!(result, Err(CompileError::Read { .. })));
    }
}
