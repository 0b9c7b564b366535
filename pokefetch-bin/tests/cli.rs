#[cfg(test)]
mod cli {
    use std::error::Error;
    use std::fs;

    use http::StatusCode;
    use predicates::str::contains;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tempfile::tempdir;
    use test_utils::{main_command, mock_server, mount_json, mount_status, species_json, type_json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type Result<T> = std::result::Result<T, Box<dyn Error>>;

    /// A server which knows pikachu and bulbasaur
    async fn species_server() -> MockServer {
        let mock_server = MockServer::start().await;
        mount_json!(
            mock_server,
            "/pokemon/pikachu",
            species_json!("pikachu", hp: 35, attack: 55, defense: 40, speed: 90)
        );
        mount_json!(
            mock_server,
            "/pokemon/bulbasaur",
            species_json!("bulbasaur", hp: 45, attack: 49, defense: 49, speed: 45)
        );
        mock_server
    }

    fn stdout_json(output: &std::process::Output) -> Result<Value> {
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    #[tokio::test]
    async fn test_load_truncates_to_whole_repetitions() -> Result<()> {
        let mock_server = species_server().await;
        let dir = tempdir()?;

        let output = main_command!()
            .current_dir(dir.path())
            .arg("load")
            .arg(format!("{}/pokemon/pikachu", mock_server.uri()))
            .arg(format!("{}/pokemon/bulbasaur", mock_server.uri()))
            .args(["--total-requests", "5", "--format", "json"])
            .output()?;

        assert!(output.status.success());
        let report = stdout_json(&output)?;
        assert_eq!(report["total"], 4);
        assert_eq!(report["successful"], 4);
        assert_eq!(report["hard_failures"], 0);
        assert!(report.get("cache").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_load_with_cache_fetches_once() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pokemon/pikachu"))
            .respond_with(ResponseTemplate::new(200).set_body_json(species_json!(
                "pikachu", hp: 35, attack: 55, defense: 40, speed: 90
            )))
            .expect(1)
            .mount(&mock_server)
            .await;
        let dir = tempdir()?;

        let output = main_command!()
            .current_dir(dir.path())
            .arg("load")
            .arg(format!("{}/pokemon/pikachu", mock_server.uri()))
            .args(["--total-requests", "10", "--cache", "--format", "json"])
            .output()?;

        assert!(output.status.success());
        let report = stdout_json(&output)?;
        assert_eq!(report["successful"], 10);
        assert_eq!(report["cache"]["misses"], 1);
        assert_eq!(report["cache"]["hits"], 9);
        assert_eq!(report["cache"]["entries"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_sequential() -> Result<()> {
        let mock_server = mock_server!(StatusCode::OK, set_body_json(species_json!(
            "pikachu", hp: 35, attack: 55, defense: 40, speed: 90
        )));
        let dir = tempdir()?;

        main_command!()
            .current_dir(dir.path())
            .arg("load")
            .arg(mock_server.uri())
            .args(["--total-requests", "3", "--sequential"])
            .assert()
            .success()
            .stdout(contains("🔍 Total............3"))
            .stdout(contains("3 OK"));
        Ok(())
    }

    #[tokio::test]
    async fn test_load_failures_exit_with_fetch_failure() -> Result<()> {
        let mock_server = mock_server!(StatusCode::NOT_FOUND);
        let dir = tempdir()?;

        main_command!()
            .current_dir(dir.path())
            .arg("load")
            .arg(mock_server.uri())
            .args(["--total-requests", "3"])
            .assert()
            .failure()
            .code(2)
            .stdout(contains("Failures (3):"))
            .stdout(contains("3 × 404 Not Found"));
        Ok(())
    }

    #[tokio::test]
    async fn test_info() -> Result<()> {
        let mock_server = species_server().await;
        let dir = tempdir()?;

        main_command!()
            .current_dir(dir.path())
            .args(["info", "Pikachu", "--api-url", &mock_server.uri()])
            .assert()
            .success()
            .stdout("Stats of Pikachu:\n- HP: 35\n- Attack: 55\n- Defense: 40\n- Speed: 90\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_compare() -> Result<()> {
        let mock_server = species_server().await;
        let dir = tempdir()?;

        main_command!()
            .current_dir(dir.path())
            .args(["compare", "pikachu", "bulbasaur", "--api-url", &mock_server.uri()])
            .assert()
            .success()
            .stdout(contains("Bulbasaur has more HP (45 vs 35)."))
            .stdout(contains("Pikachu has a better attack (55 vs 49)."));
        Ok(())
    }

    #[tokio::test]
    async fn test_type_skips_unreachable_members() -> Result<()> {
        let mock_server = species_server().await;
        mount_json!(
            mock_server,
            "/type/electric",
            type_json!("electric", ["pikachu", "raichu"])
        );
        let dir = tempdir()?;

        main_command!()
            .current_dir(dir.path())
            .args(["type", "electric", "--api-url", &mock_server.uri()])
            .assert()
            .success()
            .stdout(contains("Stats of type Electric:"))
            .stdout(contains("- Number of pokemon: 1"))
            .stdout(contains("- Average HP: 35.00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_battle() -> Result<()> {
        let mock_server = species_server().await;
        let dir = tempdir()?;

        let output = main_command!()
            .current_dir(dir.path())
            .args(["battle", "pikachu", "bulbasaur", "--format", "json"])
            .args(["--api-url", &mock_server.uri()])
            .output()?;

        assert!(output.status.success());
        let report = stdout_json(&output)?;
        assert_eq!(report["outcome"]["result"], "knock_out");
        assert_eq!(report["outcome"]["winner"], "pikachu");
        assert_eq!(report["log"][0]["damage"], 30);
        assert_eq!(report["log"][1]["damage"], 29);
        Ok(())
    }

    #[tokio::test]
    async fn test_battle_with_unknown_species() -> Result<()> {
        let mock_server = species_server().await;
        mount_status!(mock_server, "/pokemon/missingno", 404);
        let dir = tempdir()?;

        main_command!()
            .current_dir(dir.path())
            .args(["battle", "pikachu", "missingno"])
            .args(["--api-url", &mock_server.uri()])
            .assert()
            .failure()
            .code(2)
            .stderr(contains("was rejected with status 404 Not Found"));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_waits_for_rate_limit() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 25})))
            .expect(1)
            .mount(&mock_server)
            .await;
        let dir = tempdir()?;

        let output = main_command!()
            .current_dir(dir.path())
            .args(["get", &mock_server.uri()])
            .output()?;

        assert!(output.status.success());
        assert_eq!(stdout_json(&output)?, serde_json::json!({"id": 25}));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_does_not_retry_client_errors() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;
        let dir = tempdir()?;

        main_command!()
            .current_dir(dir.path())
            .args(["get", &mock_server.uri()])
            .assert()
            .failure()
            .code(2);
        Ok(())
    }

    #[test]
    fn test_own_lifecycle() -> Result<()> {
        let dir = tempdir()?;
        let store = dir.path().join("own_poke.json");
        let own = |args: &[&str]| {
            let mut cmd = main_command!();
            cmd.current_dir(dir.path()).arg("own").args(args);
            cmd
        };

        own(&["list"])
            .assert()
            .success()
            .stdout("No pokemon in store\n");

        own(&["add", "sparky", "40", "60", "30"])
            .assert()
            .success()
            .stdout("sparky - HP: 40, Attack: 60, Defense: 30\n");
        assert!(store.is_file());

        own(&["add", "sparky", "1", "1", "1"])
            .assert()
            .failure()
            .code(1)
            .stderr(contains("Pokemon `sparky` already exists"));

        own(&["rename", "sparky", "blaze"]).assert().success();
        own(&["show", "sparky"])
            .assert()
            .failure()
            .stderr(contains("Pokemon `sparky` not found"));

        let output = own(&["list", "--format", "json"]).output()?;
        assert_eq!(
            stdout_json(&output)?,
            serde_json::json!([{"name": "blaze", "hp": 40, "attack": 60, "defense": 30}])
        );

        own(&["remove", "blaze"]).assert().success();
        assert_eq!(fs::read_to_string(&store)?, "[]");
        Ok(())
    }

    #[test]
    fn test_own_custom_store_path() -> Result<()> {
        let dir = tempdir()?;
        let store = dir.path().join("nested.json");

        main_command!()
            .current_dir(dir.path())
            .args(["own", "add", "sparky", "40", "60", "30", "--store"])
            .arg(&store)
            .assert()
            .success();

        let content: Value = serde_json::from_str(&fs::read_to_string(&store)?)?;
        assert_eq!(content[0]["name"], "sparky");
        assert!(!dir.path().join("own_poke.json").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_default_config_file() -> Result<()> {
        let mock_server = species_server().await;
        let dir = tempdir()?;
        fs::write(
            dir.path().join("pokefetch.toml"),
            format!("api_url = \"{}\"\nformat = \"json\"\n", mock_server.uri()),
        )?;

        let output = main_command!()
            .current_dir(dir.path())
            .args(["info", "pikachu"])
            .output()?;

        assert!(output.status.success());
        assert_eq!(stdout_json(&output)?["hp"], 35);
        Ok(())
    }

    #[test]
    fn test_invalid_config_file() -> Result<()> {
        let dir = tempdir()?;
        let config = dir.path().join("broken.toml");
        fs::write(&config, "max_concurrenzy = 4\n")?;

        main_command!()
            .current_dir(dir.path())
            .args(["own", "list", "--config"])
            .arg(&config)
            .assert()
            .failure()
            .code(3)
            .stderr(contains("Error while loading config"));
        Ok(())
    }

    #[test]
    fn test_missing_config_file() -> Result<()> {
        let dir = tempdir()?;

        main_command!()
            .current_dir(dir.path())
            .args(["own", "list", "--config", "does-not-exist.toml"])
            .assert()
            .failure()
            .code(3);
        Ok(())
    }
}
