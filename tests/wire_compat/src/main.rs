fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use ferryload_protocol::{CheckCode, CheckOutcome, CheckResponse, ChunkForm, MergeResponse};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  server: {fixture}\n  ours:   {reserialized}"
        );
        parsed
    }

    fn outcome_of(name: &str) -> CheckOutcome {
        let resp = roundtrip_test::<CheckResponse>(name);
        CheckOutcome::try_from(resp).unwrap_or_else(|e| panic!("{name}: {e}"))
    }

    #[test]
    fn fixture_check_partial() {
        assert_eq!(
            outcome_of("check_partial.json"),
            CheckOutcome::Partial {
                uploaded_bytes: 5120,
                resume_index: 5
            }
        );
    }

    #[test]
    fn fixture_check_not_found() {
        assert_eq!(outcome_of("check_not_found.json"), CheckOutcome::NotFound);
    }

    #[test]
    fn fixture_check_complete() {
        assert_eq!(outcome_of("check_complete.json"), CheckOutcome::Complete);
        assert_eq!(
            outcome_of("check_complete_after_merge.json"),
            CheckOutcome::Complete
        );
    }

    #[test]
    fn fixture_merge() {
        let resp = roundtrip_test::<MergeResponse>("merge.json");
        assert_eq!(resp, MergeResponse::merged("movie.mkv"));
    }

    #[test]
    fn fixture_chunk_form() {
        let form = roundtrip_test::<ChunkForm>("chunk_form.json");
        let fields = form.fields();
        let names: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(names, ["hash", "index", "size", "filename"]);
        assert_eq!(fields[2].1, "1048576");
    }

    #[test]
    fn our_responses_parse_as_server_responses() {
        for outcome in [
            CheckOutcome::Complete,
            CheckOutcome::NotFound,
            CheckOutcome::Partial {
                uploaded_bytes: 1,
                resume_index: 1,
            },
        ] {
            let json = serde_json::to_string(&CheckResponse::from(outcome)).unwrap();
            let back: CheckResponse = serde_json::from_str(&json).unwrap();
            assert_eq!(CheckOutcome::try_from(back).unwrap(), outcome);
        }
    }

    #[test]
    fn partial_without_counts_is_rejected() {
        let resp: CheckResponse = serde_json::from_str(r#"{"code":10001}"#).unwrap();
        assert_eq!(resp.code, CheckCode::Partial);
        assert!(CheckOutcome::try_from(resp).is_err());
    }
}
