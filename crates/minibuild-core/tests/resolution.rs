use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use minibuild_core::{BuildConfig, FetchError, ResolveError, Workspace};
use minibuild_schema::Coordinate;
use mockito::{Mock, Server, ServerGuard};
use sha1::{Digest, Sha1};
use tempfile::TempDir;

/// Scratch area with a work tree and a local artifact repository.
struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn repository(&self) -> PathBuf {
        self.temp_dir.path().join("repository")
    }

    fn work(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join("work").join(name)
    }

    fn offline(&self) -> Workspace {
        self.workspace(Vec::new(), true)
    }

    fn online(&self, remotes: Vec<String>) -> Workspace {
        self.workspace(remotes, false)
    }

    fn workspace(&self, remote_repositories: Vec<String>, offline: bool) -> Workspace {
        Workspace::new(BuildConfig {
            offline,
            repository: self.repository(),
            remote_repositories,
            ..BuildConfig::default()
        })
        .expect("failed to create workspace")
    }

    /// Put a descriptor and archive for `group:artifact:version` in the repository.
    fn install(&self, group: &str, artifact: &str, version: &str) {
        let dir = self.repository().join(group).join(artifact).join(version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{artifact}-{version}.pom")), pom(group, artifact, version, "")).unwrap();
        fs::write(dir.join(format!("{artifact}-{version}.jar")), b"jar").unwrap();
    }
}

fn pom(group: &str, artifact: &str, version: &str, body: &str) -> String {
    format!(
        "<project><groupId>{group}</groupId><artifactId>{artifact}</artifactId>\
         <version>{version}</version>{body}</project>"
    )
}

fn dependency(group: &str, artifact: &str, version: &str) -> String {
    format!(
        "<dependencies><dependency><groupId>{group}</groupId><artifactId>{artifact}</artifactId>\
         <version>{version}</version></dependency></dependencies>"
    )
}

fn write_descriptor(dir: &Path, contents: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("pom.xml"), contents).unwrap();
}

fn sha1_hex(body: &[u8]) -> String {
    hex::encode(Sha1::digest(body))
}

/// Serve `body` at `path` along with its checksum side-car.
fn serve(server: &mut ServerGuard, path: &str, body: &[u8], hits: usize) -> (Mock, Mock) {
    let checksum = server
        .mock("GET", format!("{path}.sha1").as_str())
        .with_body(sha1_hex(body))
        .expect(hits)
        .create();
    let content = server
        .mock("GET", path)
        .with_body(body)
        .expect(hits)
        .create();
    (checksum, content)
}

/// Aggregator with one module that depends on a version range.
fn range_tree(ctx: &TestContext) -> PathBuf {
    let root = ctx.work("root");
    write_descriptor(
        &root,
        &pom("g", "a", "1.0", "<packaging>pom</packaging><modules><module>m</module></modules>"),
    );
    write_descriptor(
        &root.join("m"),
        &format!(
            "<project><parent><groupId>g</groupId><artifactId>a</artifactId><version>1.0</version></parent>\
             <artifactId>m</artifactId>{}</project>",
            dependency("other", "lib", "[1.0,2.0)")
        ),
    );
    root
}

#[test]
fn test_offline_range_resolution() {
    let ctx = TestContext::new();
    for version in ["0.9", "1.0", "1.5", "2.0"] {
        ctx.install("other", "lib", version);
    }
    let root = range_tree(&ctx);

    let mut ws = ctx.offline();
    let root_id = ws.resolve(&root).unwrap();
    let tree = ws.subtree(root_id);
    assert_eq!(tree.len(), 2);

    let m = ws.project(root_id).children[0];
    assert_eq!(ws.project(m).coordinate.to_string(), "g:m:1.0");
    assert_eq!(ws.project(m).parent, Some(root_id));
    assert!(ws.project(m).build_from_source);

    let classpath = ws.classpath(m).unwrap();
    assert_eq!(
        classpath,
        vec![ctx.repository().join("other/lib/1.5/lib-1.5.jar").canonicalize().unwrap()]
    );
}

#[test]
fn test_resolution_is_deterministic() {
    let ctx = TestContext::new();
    ctx.install("other", "lib", "1.5");
    let root = range_tree(&ctx);

    let snapshot = |ws: &Workspace| -> Vec<String> {
        ws.projects()
            .map(|(_, p)| format!("{} {}", p.coordinate, p.target.display()))
            .collect()
    };

    let mut first = ctx.offline();
    let first_root = first.resolve(&root).unwrap();
    let mut second = ctx.offline();
    second.resolve(&root).unwrap();
    assert_eq!(snapshot(&first), snapshot(&second));

    let again = first.resolve(&root).unwrap();
    assert_eq!(again, first_root);
    assert_eq!(first.projects().count(), 2);
}

#[test]
fn test_same_graph_with_empty_then_populated_cache() {
    let ctx = TestContext::new();
    let mut server = Server::new();
    let descriptor = pom("x", "lib", "1.0", "");
    let pom_mocks = serve(&mut server, "/x/lib/1.0/lib-1.0.pom", descriptor.as_bytes(), 1);
    let jar_mocks = serve(&mut server, "/x/lib/1.0/lib-1.0.jar", b"archive", 1);

    let root = ctx.work("root");
    write_descriptor(
        &root,
        &pom(
            "g",
            "root",
            "1",
            "<packaging>pom</packaging><modules><module>b</module><module>a</module></modules>",
        ),
    );
    write_descriptor(&root.join("a"), &pom("g", "a", "1", &dependency("x", "lib", "1.0")));
    write_descriptor(&root.join("b"), &pom("g", "b", "1", &dependency("x", "lib", "1.0")));

    let describe = |ws: &mut Workspace| -> Vec<String> {
        let root_id = ws.resolve(&root).unwrap();
        let children = ws.project(root_id).children.clone();
        let mut out = Vec::new();
        for child in children {
            let deps: Vec<String> = ws
                .resolve_dependencies(child)
                .unwrap()
                .projects
                .iter()
                .map(|&id| ws.project(id).coordinate.to_string())
                .collect();
            out.push(format!("{} -> {}", ws.project(child).coordinate, deps.join(",")));
        }
        out
    };

    let remotes = vec![format!("{}/", server.url())];
    let first = describe(&mut ctx.online(remotes.clone()));
    let second = describe(&mut ctx.online(remotes));

    assert_eq!(first, ["g:b:1 -> x:lib:1.0", "g:a:1 -> x:lib:1.0"]);
    assert_eq!(first, second);
    for mock in [pom_mocks.0, pom_mocks.1, jar_mocks.0, jar_mocks.1] {
        mock.assert();
    }
}

#[test]
fn test_dependency_on_sibling_reuses_source_project() {
    let ctx = TestContext::new();
    let root = ctx.work("root");
    write_descriptor(
        &root,
        &pom(
            "g",
            "root",
            "1",
            "<packaging>pom</packaging><modules><module>core</module><module>app</module></modules>",
        ),
    );
    write_descriptor(&root.join("core"), &pom("g", "core", "1", ""));
    write_descriptor(&root.join("app"), &pom("g", "app", "1", &dependency("g", "core", "1")));

    let mut ws = ctx.offline();
    let root_id = ws.resolve(&root).unwrap();
    let core = ws.find(&Coordinate::new("g", "core", "1")).unwrap();
    let app = ws.find(&Coordinate::new("g", "app", "1")).unwrap();

    assert_eq!(ws.resolve_dependencies(app).unwrap().projects, vec![core]);
    assert_eq!(ws.build_plan(&[root_id]).unwrap(), vec![core, app]);
}

#[test]
fn test_snapshot_metadata_is_reused_until_stale() {
    let ctx = TestContext::new();
    let mut server = Server::new();
    let remotes = vec![format!("{}/", server.url())];

    let concrete = "1.0-20240101.120000-3";
    let version_dir = ctx.repository().join("s/snap/1.0-SNAPSHOT");
    fs::create_dir_all(&version_dir).unwrap();
    fs::write(
        version_dir.join(format!("snap-{concrete}.pom")),
        pom("s", "snap", "1.0-SNAPSHOT", ""),
    )
    .unwrap();
    fs::write(version_dir.join(format!("snap-{concrete}.jar")), b"jar").unwrap();

    let metadata = format!(
        "<metadata><versioning><snapshotVersions><snapshotVersion>\
         <extension>jar</extension><value>{concrete}</value>\
         </snapshotVersion></snapshotVersions></versioning></metadata>"
    );
    let path = "/s/snap/1.0-SNAPSHOT/maven-metadata.xml";
    let (checksum, content) = serve(&mut server, path, metadata.as_bytes(), 1);

    let app = ctx.work("app");
    write_descriptor(&app, &pom("w", "app", "1", &dependency("s", "snap", "1.0-SNAPSHOT")));

    let expected = version_dir.join(format!("snap-{concrete}.jar")).canonicalize().unwrap();
    for _ in 0..2 {
        let mut ws = ctx.online(remotes.clone());
        let id = ws.resolve(&app).unwrap();
        assert_eq!(ws.classpath(id).unwrap(), vec![expected.clone()]);
    }
    checksum.assert();
    content.assert();
    checksum.remove();
    content.remove();

    let marker = version_dir.join("maven-metadata-snapshot.xml");
    assert!(marker.is_file());
    age(&marker);

    let (checksum, content) = serve(&mut server, path, metadata.as_bytes(), 1);
    let mut ws = ctx.online(remotes);
    let id = ws.resolve(&app).unwrap();
    assert_eq!(ws.classpath(id).unwrap(), vec![expected]);
    checksum.assert();
    content.assert();
}

fn age(marker: &Path) {
    fs::File::options()
        .write(true)
        .open(marker)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(2 * 24 * 60 * 60))
        .unwrap();
}

#[test]
fn test_range_metadata_is_reused_until_stale() {
    let ctx = TestContext::new();
    let mut server = Server::new();
    let remotes = vec![format!("{}/", server.url())];

    let metadata = "<metadata><groupId>r</groupId><artifactId>lib</artifactId><versioning><versions>\
                    <version>0.9</version><version>1.0</version><version>1.5</version><version>2.0</version>\
                    </versions></versioning></metadata>";
    let path = "/r/lib/maven-metadata.xml";
    let (checksum, content) = serve(&mut server, path, metadata.as_bytes(), 1);
    let descriptor = pom("r", "lib", "1.5", "");
    let pom_mocks = serve(&mut server, "/r/lib/1.5/lib-1.5.pom", descriptor.as_bytes(), 1);
    let jar_mocks = serve(&mut server, "/r/lib/1.5/lib-1.5.jar", b"archive", 1);

    let app = ctx.work("app");
    write_descriptor(&app, &pom("w", "app", "1", &dependency("r", "lib", "[1.0,2.0)")));

    let jar = ctx.repository().join("r/lib/1.5/lib-1.5.jar");
    for _ in 0..2 {
        let mut ws = ctx.online(remotes.clone());
        let id = ws.resolve(&app).unwrap();
        assert_eq!(ws.classpath(id).unwrap(), vec![jar.canonicalize().unwrap()]);
    }
    for mock in [checksum, content, pom_mocks.0, pom_mocks.1, jar_mocks.0, jar_mocks.1] {
        mock.assert();
        mock.remove();
    }

    let marker = ctx.repository().join("r/lib/maven-metadata-version.xml");
    assert!(marker.is_file());
    assert!(!ctx.repository().join("r/lib/maven-metadata.xml").exists());
    age(&marker);

    let (checksum, content) = serve(&mut server, path, metadata.as_bytes(), 1);
    let (pom_checksum, pom_content) = serve(&mut server, "/r/lib/1.5/lib-1.5.pom", descriptor.as_bytes(), 0);
    let mut ws = ctx.online(remotes);
    let id = ws.resolve(&app).unwrap();
    assert_eq!(ws.classpath(id).unwrap(), vec![jar.canonicalize().unwrap()]);
    checksum.assert();
    content.assert();
    pom_checksum.assert();
    pom_content.assert();
}

#[test]
fn test_parent_is_downloaded_without_archive() {
    let ctx = TestContext::new();
    let mut server = Server::new();
    let remotes = vec![format!("{}/", server.url())];

    let parent = pom("p", "base", "1", "<packaging>pom</packaging><properties><greeting>hi</greeting></properties>");
    let (checksum, content) = serve(&mut server, "/p/base/1/base-1.pom", parent.as_bytes(), 1);
    let (jar_checksum, jar_content) = serve(&mut server, "/p/base/1/base-1.jar", b"archive", 0);

    let child = ctx.work("child");
    write_descriptor(
        &child,
        "<project><parent><groupId>p</groupId><artifactId>base</artifactId><version>1</version></parent>\
         <artifactId>child</artifactId></project>",
    );

    for _ in 0..2 {
        let mut ws = ctx.online(remotes.clone());
        let id = ws.resolve(&child).unwrap();
        let parent_id = ws.project(id).parent.expect("parent linked");

        assert_eq!(ws.project(id).coordinate.to_string(), "p:child:1");
        assert_eq!(ws.project(parent_id).coordinate.to_string(), "p:base:1");
        assert_eq!(ws.project(parent_id).children, [id]);
        assert_eq!(ws.expand(Some(id), "${greeting}"), "hi");
    }

    let dir = ctx.repository().join("p/base/1");
    assert!(dir.join("base-1.pom").is_file());
    assert!(!dir.join("base-1.jar").exists());
    checksum.assert();
    content.assert();
    jar_checksum.assert();
    jar_content.assert();
}

#[test]
fn test_corrupt_archive_is_not_installed() {
    let ctx = TestContext::new();
    let mut server = Server::new();
    let descriptor = pom("x", "lib", "1.0", "");
    let _pom = serve(&mut server, "/x/lib/1.0/lib-1.0.pom", descriptor.as_bytes(), 1);
    let _checksum = server
        .mock("GET", "/x/lib/1.0/lib-1.0.jar.sha1")
        .with_body(sha1_hex(b"the real archive"))
        .create();
    let _archive = server
        .mock("GET", "/x/lib/1.0/lib-1.0.jar")
        .with_body("tampered")
        .create();

    let app = ctx.work("app");
    write_descriptor(&app, &pom("w", "app", "1", &dependency("x", "lib", "1.0")));

    let mut ws = ctx.online(vec![format!("{}/", server.url())]);
    let id = ws.resolve(&app).unwrap();
    let err = ws.classpath(id).unwrap_err();
    assert!(
        matches!(err, ResolveError::Fetch(FetchError::Integrity { .. })),
        "unexpected {err:?}"
    );

    let dir = ctx.repository().join("x/lib/1.0");
    assert!(dir.join("lib-1.0.pom").is_file());
    assert!(!dir.join("lib-1.0.jar").exists());
    let leftovers: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".new"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_falls_back_to_next_repository() {
    let ctx = TestContext::new();
    let mut empty = Server::new();
    let missing = empty
        .mock("GET", mockito::Matcher::Any)
        .with_status(404)
        .expect_at_least(1)
        .create();
    let mut mirror = Server::new();
    let descriptor = pom("x", "lib", "1.0", "");
    let _pom = serve(&mut mirror, "/x/lib/1.0/lib-1.0.pom", descriptor.as_bytes(), 1);
    let _jar = serve(&mut mirror, "/x/lib/1.0/lib-1.0.jar", b"archive", 1);

    let app = ctx.work("app");
    write_descriptor(
        &app,
        &pom(
            "w",
            "app",
            "1",
            &format!(
                "<repositories><repository><url>{}</url></repository></repositories>{}",
                empty.url(),
                dependency("x", "lib", "1.0")
            ),
        ),
    );

    let mut ws = ctx.online(vec![format!("{}/", mirror.url())]);
    let id = ws.resolve(&app).unwrap();
    let classpath = ws.classpath(id).unwrap();

    let jar = ctx.repository().join("x/lib/1.0/lib-1.0.jar");
    assert_eq!(classpath, vec![jar.canonicalize().unwrap()]);
    assert_eq!(fs::read(&jar).unwrap(), b"archive");
    assert!(jar.with_extension("jar.sha1").is_file());
    missing.assert();
}

#[test]
fn test_missing_parent_names_the_child() {
    let ctx = TestContext::new();
    let dir = ctx.work("orphan");
    write_descriptor(
        &dir,
        "<project><parent><groupId>p</groupId><artifactId>gone</artifactId><version>1</version></parent>\
         <artifactId>orphan</artifactId></project>",
    );

    let mut ws = ctx.offline();
    let err = ws.resolve(&dir).unwrap_err();
    assert!(matches!(err, ResolveError::UnresolvedParent { .. }), "unexpected {err:?}");
    assert!(err.to_string().contains("p:gone:1"));
    assert_eq!(ws.projects().count(), 0);
}
