//! Tests for drafts, sources, projects and configuration

mod common;

use apm::error::*;
use apm::package::archive;
use apm::package::*;
use apm::tools::{CheckReport, TypeChecker};
use common::{deps, package, write_files};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn make_draft(parent: &Path, name: &str, deps_txt: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = parent.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("deps.txt"), deps_txt).unwrap();
    write_files(&dir, files);
    dir
}

/// Test source classification
#[test]
fn test_source_classification() {
    let temp_dir = TempDir::new().unwrap();
    write_files(
        temp_dir.path(),
        &[
            ("Main.agda", ""),
            ("Data/List.agda", ""),
            ("README.md", ""),
            ("deps.txt", ""),
            ("notes.txt", ""),
            (".hidden/Secret.agda", ""),
        ],
    );

    let source = Source::load(temp_dir.path()).unwrap();
    assert_eq!(source.primary_files(), ["Data/List.agda", "Main.agda"]);
    assert_eq!(source.doc_files(), ["README.md"]);
    assert_eq!(source.misc_files(), ["deps.txt", "notes.txt"]);
}

#[test]
fn test_source_custom_kinds() {
    let temp_dir = TempDir::new().unwrap();
    write_files(temp_dir.path(), &[("a.lagda", ""), ("b.agda", ""), ("c.rst", "")]);

    let source = Source::load_with(temp_dir.path(), &FileKinds::new("lagda", "rst")).unwrap();
    assert_eq!(source.primary_files(), ["a.lagda"]);
    assert_eq!(source.doc_files(), ["c.rst"]);
    assert_eq!(source.misc_files(), ["b.agda"]);
}

#[test]
fn test_source_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let err = Source::load(&temp_dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, ApmError::NotFound(NotFoundError::Source(_))));
}

#[test]
fn test_archive_is_deterministic() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let files = [("B.agda", "b"), ("A.agda", "a"), ("sub/C.md", "c")];
    write_files(first.path(), &files);
    write_files(second.path(), &files);

    let names = vec!["sub/C.md".to_string(), "B.agda".to_string(), "A.agda".to_string()];
    let mut reordered = names.clone();
    reordered.reverse();

    let a = archive::pack(first.path(), &names).unwrap();
    let b = archive::pack(second.path(), &reordered).unwrap();
    assert_eq!(a, b);

    let out = TempDir::new().unwrap();
    let written = archive::unpack(&a, out.path()).unwrap();
    assert_eq!(written.len(), 3);
    assert_eq!(fs::read_to_string(out.path().join("sub/C.md")).unwrap(), "c");
}

#[test]
fn test_draft_load() {
    let temp_dir = TempDir::new().unwrap();
    let dep = package("dep", DirectDeps::new());
    let dir = make_draft(
        temp_dir.path(),
        "mylib",
        &format!("dep {}\n", dep.id()),
        &[("MyLib.agda", "module MyLib where\n")],
    );

    let draft = Draft::load(&dir).unwrap();
    assert_eq!(draft.name(), "mylib");
    assert_eq!(draft.deps().get("dep"), Some(dep.id()));
    assert_eq!(draft.source().primary_files(), ["MyLib.agda"]);
}

#[test]
fn test_draft_load_errors() {
    let temp_dir = TempDir::new().unwrap();
    let err = Draft::load(&temp_dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, ApmError::NotFound(NotFoundError::Draft(_))));

    let no_deps = temp_dir.path().join("nodeps");
    fs::create_dir(&no_deps).unwrap();
    let err = Draft::load(&no_deps).unwrap_err();
    assert!(matches!(err, ApmError::NotFound(NotFoundError::DepsFile(_))));

    let bad = make_draft(temp_dir.path(), "bad", "just-one-token\n", &[]);
    let err = Draft::load(&bad).unwrap_err();
    assert!(matches!(err, ApmError::Parse(ParseError::FailedToParseDeps { .. })));
}

#[test]
fn test_pack_and_unpack() {
    let temp_dir = TempDir::new().unwrap();
    let dep = package("dep", DirectDeps::new());
    let dir = make_draft(
        temp_dir.path(),
        "mylib",
        &format!("dep {}\n", dep.id()),
        &[("MyLib.agda", "module MyLib where\n"), ("README.md", "docs"), ("scratch.txt", "x")],
    );

    let packed = pack(&Draft::load(&dir).unwrap()).unwrap();
    assert_eq!(packed.name(), "mylib");
    assert_eq!(packed.deps(), &deps(&[("dep", dep.id())]));

    let again = pack(&Draft::load(&dir).unwrap()).unwrap();
    assert_eq!(packed.id(), again.id());

    let out = TempDir::new().unwrap();
    let draft = unpack(&packed, out.path(), &FileKinds::default()).unwrap();
    assert_eq!(draft.dir(), out.path().join("mylib"));
    assert_eq!(draft.deps(), packed.deps());
    assert_eq!(draft.source().primary_files(), ["MyLib.agda"]);
    assert_eq!(draft.source().doc_files(), ["README.md"]);
    assert!(!out.path().join("mylib/scratch.txt").exists());

    assert_eq!(pack(&draft).unwrap().id(), packed.id());
}

#[test]
fn test_draft_create_destination_rules() {
    let temp_dir = TempDir::new().unwrap();
    let pkg = package("pkg", DirectDeps::new());

    let err = Draft::create(&temp_dir.path().join("other"), &pkg, &FileKinds::default()).unwrap_err();
    assert!(matches!(err, ApmError::InvalidDestination { .. }));

    let dest = temp_dir.path().join("pkg");
    fs::create_dir(&dest).unwrap();
    let err = Draft::create(&dest, &pkg, &FileKinds::default()).unwrap_err();
    assert!(matches!(err, ApmError::AlreadyExists(AlreadyExistsError::Destination(_))));
}

#[test]
fn test_package_file_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let pkg = package("pkg", DirectDeps::new());
    let path = temp_dir.path().join("pkg.apm");

    pkg.write_to(&path).unwrap();
    assert!(pkg.write_to(&path).is_err());

    let loaded = Package::load(&path).unwrap();
    assert_eq!(loaded, pkg);
    assert_eq!(loaded.payload(), pkg.payload());

    match Bundle::load(&path, &FileKinds::default()).unwrap() {
        Bundle::Package(p) => assert_eq!(p.id(), pkg.id()),
        Bundle::Draft(_) => panic!("expected a package"),
    }
    assert!(Bundle::load(&temp_dir.path().join("none"), &FileKinds::default()).is_err());
}

#[test]
fn test_package_rejects_invalid_name() {
    let err = Package::create("../escape", DirectDeps::new(), &[]).unwrap_err();
    assert!(matches!(err, ApmError::Parse(ParseError::InvalidName(_))));
}

#[test]
fn test_project_init_and_load() {
    let temp_dir = TempDir::new().unwrap();
    let project = Project::init(temp_dir.path(), "app", &FileKinds::default()).unwrap();

    assert_eq!(project.name(), "app");
    assert_eq!(project.cwd(), temp_dir.path().join("app"));
    assert!(project.root_dir().join("deps.txt").is_file());
    assert!(project.direct_deps().is_empty());
    assert!(project.dependency_sources().is_empty());

    let err = Project::init(temp_dir.path(), "app", &FileKinds::default()).unwrap_err();
    assert!(matches!(err, ApmError::AlreadyExists(AlreadyExistsError::Project(_))));
}

#[test]
fn test_project_find() {
    let temp_dir = TempDir::new().unwrap();
    let project = Project::init(temp_dir.path(), "app", &FileKinds::default()).unwrap();
    let nested = project.root_dir().join("src/deep");
    fs::create_dir_all(&nested).unwrap();

    for start in [project.cwd().to_path_buf(), project.root_dir(), nested] {
        let found = Project::find(&start, &FileKinds::default()).unwrap();
        assert_eq!(found.cwd(), project.cwd());
    }

    let err = Project::find(temp_dir.path(), &FileKinds::default()).unwrap_err();
    assert!(matches!(err, ApmError::NotFound(NotFoundError::Project(_))));
}

#[test]
fn test_project_clean() {
    let temp_dir = TempDir::new().unwrap();
    let mut project = Project::init(temp_dir.path(), "app", &FileKinds::default()).unwrap();
    let cwd = project.cwd().to_path_buf();
    make_draft(&cwd, "dep1", "", &[("Dep1.agda", "")]);
    make_draft(&cwd, "dep2", "", &[]);
    fs::write(cwd.join("stray.apm"), "x").unwrap();
    fs::write(cwd.join("apm.toml"), "").unwrap();

    project.refresh().unwrap();
    assert_eq!(project.dependency_sources().len(), 2);

    let removed = project.clean().unwrap();
    assert_eq!(removed.len(), 3);
    assert!(project.dependency_sources().is_empty());
    assert!(project.root_dir().is_dir());
    assert!(cwd.join("apm.toml").exists());
}

struct FakeChecker {
    fail: Option<&'static str>,
}

impl TypeChecker for FakeChecker {
    fn check(&self, source: &Source, include_dirs: &[PathBuf]) -> ApmResult<CheckReport> {
        let mut report = CheckReport::default();
        for file in source.primary_files() {
            if Some(file.as_str()) == self.fail {
                report.failed.push((file.clone(), format!("{} includes", include_dirs.len())));
            } else {
                report.passed.push(file.clone());
            }
        }
        Ok(report)
    }
}

#[test]
fn test_project_check() {
    let temp_dir = TempDir::new().unwrap();
    let mut project = Project::init(temp_dir.path(), "app", &FileKinds::default()).unwrap();
    write_files(&project.root_dir(), &[("App.agda", ""), ("Util.agda", "")]);
    make_draft(project.cwd(), "dep", "", &[("Dep.agda", "")]);
    project.refresh().unwrap();

    let report = project.check(&FakeChecker { fail: None }).unwrap();
    assert_eq!(report.checked(), 2);
    assert!(report.success());

    let err = project.check(&FakeChecker { fail: Some("Util.agda") }).unwrap_err();
    match err {
        ApmError::Check(message) => {
            assert!(message.contains("1 of 2 files failed"));
            assert!(message.contains("Util.agda"));
            assert!(message.contains("1 includes"));
        }
        other => panic!("expected a check failure, got {:?}", other),
    }
}

#[test]
fn test_config_defaults_and_toml() {
    let config = Config::default();
    assert_eq!(config.primary_extension, "agda");
    assert_eq!(config.doc_extension, "md");
    assert_eq!(config.checker.program, "agda");
    assert!(config.registry.ends_with(".apm/registry"));

    let parsed = Config::from_toml(&config.to_toml().unwrap()).unwrap();
    assert_eq!(parsed, config);

    assert!(Config::from_toml("unknown = 1").is_err());
}

#[test]
fn test_config_layering() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("apm.toml");
    fs::write(&path, "primary_extension = \"lagda\"\n[checker]\nargs = [\"--safe\"]\n").unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.primary_extension, "lagda");
    assert_eq!(config.doc_extension, "md");
    assert_eq!(config.checker.program, "agda");
    assert_eq!(config.checker.args, ["--safe"]);
    assert_eq!(config.file_kinds(), FileKinds::new("lagda", "md"));

    fs::write(&path, "registry = 5").unwrap();
    let err = Config::from_file(&path).unwrap_err();
    assert!(matches!(err, ApmError::Parse(ParseError::InvalidConfig { .. })));
}

#[test]
fn test_config_project_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.doc_extension = "rst".to_string();
    config.checker.args = vec!["--safe".to_string()];
    let path = temp_dir.path().join("apm.toml");
    config.write_to_file(&path).unwrap();

    let mut loaded = Config::default();
    loaded.merge_file(&path).unwrap();
    assert_eq!(loaded.doc_extension, "rst");
    assert_eq!(loaded.checker.args, ["--safe"]);
}
