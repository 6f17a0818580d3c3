//! Debug artifacts
//!
//! Best effort: a failed write is logged and swallowed, never propagated.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::pretty_print;
use crate::features::construct_id::ConstructId;

/// `<dir>/<package path>/<Type>.<construct>` without extension
fn construct_stem(dump_dir: &Path, construct: &ConstructId) -> PathBuf {
    let owner = construct.owner().unwrap_or_else(|| construct.simple_name());
    let (package, type_name) = split_type_name(owner);
    let member = match construct {
        ConstructId::Method {
            name, parameters, ..
        } => format!("{name}({})", parameters.join(",")),
        ConstructId::Constructor { parameters, .. } => format!("<init>({})", parameters.join(",")),
        other => other.simple_name().to_string(),
    };
    let file_name = format!("{type_name}.{}", member.replace(['<', '>'], "_"));
    package_dir(dump_dir, package).join(file_name)
}

fn split_type_name(qualified: &str) -> (&str, &str) {
    qualified.rsplit_once('.').unwrap_or(("", qualified))
}

fn package_dir(dump_dir: &Path, package: &str) -> PathBuf {
    package
        .split('.')
        .filter(|segment| !segment.is_empty())
        .fold(dump_dir.to_path_buf(), |dir, segment| dir.join(segment))
}

/// Path of the pretty-printed injection source for `construct`
pub fn source_artifact_path(dump_dir: &Path, construct: &ConstructId) -> PathBuf {
    let mut path = construct_stem(dump_dir, construct).into_os_string();
    path.push(".java");
    PathBuf::from(path)
}

/// Path of the untouched class bytes saved next to a failed construct's source
pub fn original_artifact_path(dump_dir: &Path, construct: &ConstructId) -> PathBuf {
    let mut path = construct_stem(dump_dir, construct).into_os_string();
    path.push(".orig.class");
    PathBuf::from(path)
}

/// Path of a finalized class, from its dotted name
pub fn class_artifact_path(dump_dir: &Path, qualified_type: &str) -> PathBuf {
    let (package, type_name) = split_type_name(qualified_type);
    package_dir(dump_dir, package).join(format!("{type_name}.class"))
}

fn write_artifact(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

/// Writes `source` pretty-printed; returns the path when the write succeeded
pub fn write_source_artifact(
    dump_dir: &Path,
    construct: &ConstructId,
    source: &str,
) -> Option<PathBuf> {
    let path = source_artifact_path(dump_dir, construct);
    match write_artifact(&path, pretty_print(source).as_bytes()) {
        Ok(()) => {
            debug!(construct = %construct, path = %path.display(), "wrote instrumentation source");
            Some(path)
        }
        Err(err) => {
            warn!(
                construct = %construct,
                path = %path.display(),
                error = %err,
                "cannot write instrumentation code"
            );
            None
        }
    }
}

pub fn write_original_artifact(
    dump_dir: &Path,
    construct: &ConstructId,
    bytes: &[u8],
) -> Option<PathBuf> {
    let path = original_artifact_path(dump_dir, construct);
    match write_artifact(&path, bytes) {
        Ok(()) => Some(path),
        Err(err) => {
            warn!(construct = %construct, path = %path.display(), error = %err, "cannot write original bytes");
            None
        }
    }
}

pub fn write_class_artifact(dump_dir: &Path, qualified_type: &str, bytes: &[u8]) -> Option<PathBuf> {
    let path = class_artifact_path(dump_dir, qualified_type);
    match write_artifact(&path, bytes) {
        Ok(()) => Some(path),
        Err(err) => {
            warn!(class = qualified_type, path = %path.display(), error = %err, "cannot write instrumented class");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_escape_angle_brackets() {
        let dir = Path::new("/tmp/dump");
        let clinit = ConstructId::static_initializer("a.b.C");
        assert_eq!(
            source_artifact_path(dir, &clinit),
            PathBuf::from("/tmp/dump/a/b/C._clinit_.java")
        );

        let ctor = ConstructId::constructor("a.Outer$Inner", vec!["String".into()], true);
        assert_eq!(
            original_artifact_path(dir, &ctor),
            PathBuf::from("/tmp/dump/a/Outer$Inner._init_(String).orig.class")
        );

        let method = ConstructId::method("C", "run", vec!["int".into(), "long".into()]);
        assert_eq!(
            source_artifact_path(dir, &method),
            PathBuf::from("/tmp/dump/C.run(int,long).java")
        );
    }

    #[test]
    fn test_class_path() {
        assert_eq!(
            class_artifact_path(Path::new("out"), "a.b.Outer$Inner"),
            PathBuf::from("out/a/b/Outer$Inner.class")
        );
    }

    #[test]
    fn test_write_source_pretty_prints() {
        let dir = tempfile::tempdir().unwrap();
        let method = ConstructId::method("p.C", "m", Vec::new());
        let path = write_source_artifact(dir.path(), &method, "try {a();}").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "try {\n  a();\n  }\n");
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file cannot act as a directory
        let method = ConstructId::method("p.C", "m", Vec::new());
        assert!(write_source_artifact(file.path(), &method, "x;").is_none());
    }
}
