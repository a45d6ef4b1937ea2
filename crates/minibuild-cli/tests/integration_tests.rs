use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Test context with an isolated home and local repository.
struct TestContext {
    temp_dir: TempDir,
    repository: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let repository = temp_dir.path().join("repository");
        fs::create_dir_all(&repository).expect("failed to create repository");
        Self {
            temp_dir,
            repository,
        }
    }

    fn minibuild(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_minibuild"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("MINIBUILD_REPOSITORY", &self.repository);
        cmd.env("MINIBUILD_OFFLINE", "1");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn project(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join("work").join(name)
    }

    fn install(&self, group: &str, artifact: &str, version: &str) {
        let dir = self.repository.join(group).join(artifact).join(version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(format!("{artifact}-{version}.pom")),
            format!(
                "<project><groupId>{group}</groupId><artifactId>{artifact}</artifactId>\
                 <version>{version}</version></project>"
            ),
        )
        .unwrap();
        fs::write(dir.join(format!("{artifact}-{version}.jar")), b"jar").unwrap();
    }
}

fn write_descriptor(dir: &Path, contents: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("pom.xml"), contents).unwrap();
}

/// Aggregator `g:a:1.0` with module `m` depending on `other:lib:[1.0,2.0)`.
fn range_tree(ctx: &TestContext) -> PathBuf {
    let root = ctx.project("root");
    write_descriptor(
        &root,
        "<project><groupId>g</groupId><artifactId>a</artifactId><version>1.0</version>\
         <packaging>pom</packaging><modules><module>m</module></modules></project>",
    );
    write_descriptor(
        &root.join("m"),
        "<project><parent><groupId>g</groupId><artifactId>a</artifactId><version>1.0</version></parent>\
         <artifactId>m</artifactId><dependencies><dependency><groupId>other</groupId>\
         <artifactId>lib</artifactId><version>[1.0,2.0)</version></dependency></dependencies></project>",
    );
    root
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx
        .minibuild()
        .arg("--help")
        .output()
        .expect("failed to run minibuild");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("classpath"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx
        .minibuild()
        .arg("--version")
        .output()
        .expect("failed to run minibuild");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_resolve_json_offline() {
    let ctx = TestContext::new();
    ctx.install("other", "lib", "1.5");
    let root = range_tree(&ctx);

    let output = ctx
        .minibuild()
        .arg("resolve")
        .arg(&root)
        .arg("--json")
        .output()
        .expect("failed to run minibuild resolve");
    assert!(
        output.status.success(),
        "resolve failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let tree: serde_json::Value = serde_json::from_slice(&output.stdout).expect("invalid JSON");
    assert_eq!(tree["coordinate"], "g:a:1.0");
    assert_eq!(tree["build_from_source"], false);
    assert_eq!(tree["children"][0]["coordinate"], "g:m:1.0");
    assert_eq!(tree["children"][0]["build_from_source"], true);
}

#[test]
fn test_classpath_picks_range_match() {
    let ctx = TestContext::new();
    for version in ["1.0", "1.5", "2.0"] {
        ctx.install("other", "lib", version);
    }
    let root = range_tree(&ctx);

    let output = ctx
        .minibuild()
        .arg("classpath")
        .arg(root.join("m"))
        .output()
        .expect("failed to run minibuild classpath");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.trim().ends_with("lib-1.5.jar"), "classpath was {stdout}");
}

#[test]
fn test_missing_dependency_fails_with_reason() {
    let ctx = TestContext::new();
    let root = range_tree(&ctx);

    let output = ctx
        .minibuild()
        .arg("classpath")
        .arg(root.join("m"))
        .output()
        .expect("failed to run minibuild classpath");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("other:lib"), "stderr was {stderr}");
    assert!(stderr.contains("offline"), "stderr was {stderr}");
}

#[test]
fn test_discover_lists_projects() {
    let ctx = TestContext::new();
    let roots = ctx.project("roots");
    for name in ["alpha", "beta", "skipped"] {
        write_descriptor(
            &roots.join(name),
            &format!("<project><groupId>d</groupId><artifactId>{name}</artifactId><version>1</version></project>"),
        );
    }
    fs::create_dir_all(roots.join("no-descriptor")).unwrap();

    let output = ctx
        .minibuild()
        .arg("discover")
        .arg(&roots)
        .arg("--exclude")
        .arg(roots.join("skipped"))
        .output()
        .expect("failed to run minibuild discover");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let found: Vec<_> = stdout
        .lines()
        .map(|line| line.split('\t').next().unwrap_or_default())
        .collect();
    assert_eq!(found, ["d:alpha:1", "d:beta:1"]);
}
