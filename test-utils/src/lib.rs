//! `test-utils` is used for testing in both `pokefetch-lib` and `pokefetch-bin`.
//! This crate does not depend on `pokefetch-lib` or `pokefetch-bin`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock web server, which responds with a predefined status when
/// handling a matching request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Answer `GET $path` on an existing mock server with a JSON body and `200 OK`
#[macro_export]
macro_rules! mount_json {
    ($mock_server:expr, $path:expr, $body:expr $(,)?) => {
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path($path))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json($body))
            .mount(&$mock_server)
            .await
    };
}

/// Answer `GET $path` on an existing mock server with a bare status code
#[macro_export]
macro_rules! mount_status {
    ($mock_server:expr, $path:expr, $status:expr $(,)?) => {
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path($path))
            .respond_with(wiremock::ResponseTemplate::new($status))
            .mount(&$mock_server)
            .await
    };
}

/// Build a species payload shaped like the ones of the species API.
///
/// Stats are listed in the order the API uses, with two filler stats the
/// code is expected to ignore.
#[macro_export]
macro_rules! species_json {
    ($name:expr, hp: $hp:expr, attack: $attack:expr, defense: $defense:expr, speed: $speed:expr $(,)?) => {
        serde_json::json!({
            "name": $name,
            "stats": [
                { "base_stat": $hp, "effort": 0, "stat": { "name": "hp" } },
                { "base_stat": $attack, "effort": 0, "stat": { "name": "attack" } },
                { "base_stat": $defense, "effort": 0, "stat": { "name": "defense" } },
                { "base_stat": 50, "effort": 0, "stat": { "name": "special-attack" } },
                { "base_stat": 50, "effort": 0, "stat": { "name": "special-defense" } },
                { "base_stat": $speed, "effort": 0, "stat": { "name": "speed" } }
            ]
        })
    };
}

/// Build a type payload listing the given species names as members
#[macro_export]
macro_rules! type_json {
    ($name:expr, [$($member:expr),* $(,)?]) => {
        serde_json::json!({
            "name": $name,
            "pokemon": [
                $({ "slot": 1, "pokemon": { "name": $member } }),*
            ]
        })
    };
}

/// Get the root path of the project.
#[macro_export]
macro_rules! root_path {
    () => {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .to_path_buf()
    };
}

/// Gets the "main" binary name (e.g. `pokefetch`)
#[macro_export]
macro_rules! main_command {
    () => {
        assert_cmd::cargo::cargo_bin_cmd!("pokefetch")
    };
}
