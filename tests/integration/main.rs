//! Integration tests for swcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn swcache() -> Command {
        cargo_bin_cmd!("swcache")
    }

    /// A site directory, a state directory and a config pointing at both
    struct Fixture {
        _temp: TempDir,
        site: PathBuf,
        config: PathBuf,
    }

    impl Fixture {
        fn new(backend: &str) -> Self {
            let temp = TempDir::new().unwrap();
            let site = temp.path().join("site");
            let state = temp.path().join("state");
            fs::create_dir_all(site.join("app")).unwrap();

            fs::write(site.join("app").join("index.html"), "<h1>app</h1>").unwrap();
            fs::write(site.join("app").join("main.js"), "console.log(1)").unwrap();
            fs::write(site.join("live.txt"), "live").unwrap();
            write_script(&site, "pages-cache-v1");

            let config = temp.path().join("config.toml");
            fs::write(
                &config,
                format!(
                    "[general]\naudit_log = false\n\n[origin]\nroot = {:?}\n\n[storage]\nbackend = \"{}\"\ndir = {:?}\n",
                    site.display().to_string(),
                    backend,
                    state.display().to_string()
                ),
            )
            .unwrap();

            Self {
                _temp: temp,
                site,
                config,
            }
        }

        fn cmd(&self) -> Command {
            let mut cmd = swcache();
            cmd.env("SWCACHE_CONFIG", &self.config);
            cmd
        }
    }

    fn write_script(site: &Path, cache_name: &str) {
        fs::write(
            site.join("sw.toml"),
            format!(
                "cache_name = \"{}\"\nurls_to_cache = [\"/app/\", \"/app/main.js\"]\n",
                cache_name
            ),
        )
        .unwrap();
    }

    #[test]
    fn help_displays() {
        swcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("request cache"));
    }

    #[test]
    fn version_displays() {
        swcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("swcache"));
    }

    #[test]
    fn config_path_follows_env() {
        let fixture = Fixture::new("disk");
        fixture
            .cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let fixture = Fixture::new("disk");
        fixture
            .cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[storage]"))
            .stdout(predicate::str::contains("audit_log = false"));
    }

    #[test]
    fn status_without_registration() {
        let fixture = Fixture::new("disk");
        fixture
            .cmd()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No worker registered"));
    }

    #[test]
    fn register_then_serve_offline() {
        let fixture = Fixture::new("disk");

        fixture
            .cmd()
            .args(["register", "/sw.toml"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Registered /sw.toml with scope /"));

        fixture
            .cmd()
            .args(["fetch", "/app/"])
            .assert()
            .success()
            .stdout("<h1>app</h1>");

        // Cached assets survive the origin losing them
        fs::remove_file(fixture.site.join("app").join("index.html")).unwrap();
        fixture
            .cmd()
            .args(["fetch", "/app/"])
            .assert()
            .success()
            .stdout("<h1>app</h1>");

        fixture
            .cmd()
            .args(["caches", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout("pages-cache-v1\n");

        fixture
            .cmd()
            .args(["caches", "show", "pages-cache-v1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/app/main.js"));

        fixture
            .cmd()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("pages-cache-v1"))
            .stdout(predicate::str::contains("activated"));
    }

    #[test]
    fn uncached_requests_go_to_origin() {
        let fixture = Fixture::new("disk");
        fixture.cmd().args(["register", "/sw.toml"]).assert().success();

        fixture
            .cmd()
            .args(["fetch", "/live.txt"])
            .assert()
            .success()
            .stdout("live");

        fixture
            .cmd()
            .args(["caches", "show", "pages-cache-v1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/live.txt").not());
    }

    #[test]
    fn include_prints_status_line() {
        let fixture = Fixture::new("disk");
        fixture
            .cmd()
            .args(["fetch", "-i", "/missing.txt"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("404 Not Found\n"));
    }

    #[test]
    fn new_version_waits_then_prunes_old_cache() {
        let fixture = Fixture::new("disk");
        fixture.cmd().args(["register", "/sw.toml"]).assert().success();

        write_script(&fixture.site, "pages-cache-v2");
        fixture
            .cmd()
            .args(["register", "/sw.toml"])
            .assert()
            .success()
            .stdout(predicate::str::contains("waiting"));

        fixture
            .cmd()
            .args(["caches", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout("pages-cache-v1\npages-cache-v2\n");

        fixture
            .cmd()
            .arg("activate")
            .assert()
            .success()
            .stdout(predicate::str::contains("pages-cache-v2"));

        fixture
            .cmd()
            .args(["caches", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout("pages-cache-v2\n");
    }

    #[test]
    fn failed_install_is_reported_not_fatal() {
        let fixture = Fixture::new("disk");
        fs::remove_file(fixture.site.join("app").join("main.js")).unwrap();

        fixture
            .cmd()
            .args(["register", "/sw.toml"])
            .assert()
            .success()
            .stderr(predicate::str::contains("registration failed"));

        // Nothing from the failed batch was committed
        fixture
            .cmd()
            .args(["caches", "show", "pages-cache-v1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/app/").not());

        fixture
            .cmd()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No worker registered"));
    }

    #[test]
    fn unsupported_backend_still_fetches() {
        let fixture = Fixture::new("none");

        fixture
            .cmd()
            .args(["register", "/sw.toml"])
            .assert()
            .success()
            .stdout(predicate::str::contains("not supported"));

        fixture
            .cmd()
            .args(["fetch", "/live.txt"])
            .assert()
            .success()
            .stdout("live");

        fixture
            .cmd()
            .args(["caches", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn delete_unknown_cache_fails() {
        let fixture = Fixture::new("disk");
        fixture
            .cmd()
            .args(["caches", "delete", "nope"])
            .assert()
            .failure();
    }

    #[test]
    fn activate_without_registration_fails() {
        let fixture = Fixture::new("disk");
        fixture.cmd().arg("activate").assert().failure();
    }
}
