use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const T0: i64 = 1_700_000_000_000;

fn pgh_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pgh");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/pages.sqlite"

[retrieval]
default_limit = 10
suggest_limit = 5
"#,
        root.display()
    );

    let config_path = config_dir.join("pgh.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pgh(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pgh_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pgh binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn run_ok(config_path: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_pgh(config_path, args);
    assert!(
        success,
        "pgh {:?} failed: stdout={}, stderr={}",
        args, stdout, stderr
    );
    stdout
}

fn search_json(config_path: &Path, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["search", "--json"];
    full.extend_from_slice(args);
    serde_json::from_str(&run_ok(config_path, &full)).unwrap()
}

fn result_urls(value: &serde_json::Value) -> Vec<String> {
    value["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["url"].as_str().unwrap().to_string())
        .collect()
}

/// Three pages: two on lorem.com, one on test.com, one bookmark, two tags.
fn seed(config_path: &Path) {
    let v1 = (T0 + 60_000).to_string();
    let v2 = (T0 + 120_000).to_string();
    let v3 = (T0 + 180_000).to_string();
    let bm = T0.to_string();

    run_ok(config_path, &["init"]);
    run_ok(
        config_path,
        &[
            "add", "https://lorem.com/test2", "--title", "Lorem page",
            "--text", "lorem ipsum dummy text", "--visit", &v1,
        ],
    );
    run_ok(
        config_path,
        &[
            "add", "https://www.lorem.com/test1", "--title", "Another",
            "--text", "dummy words about a wild fox", "--visit", &v2,
            "--bookmark", &bm,
        ],
    );
    run_ok(
        config_path,
        &[
            "add", "http://test.com/test", "--title", "Test",
            "--text", "hairy hen and dummy", "--visit", &v3,
        ],
    );
    run_ok(config_path, &["tag", "test.com/test", "good"]);
    run_ok(config_path, &["tag", "test.com/test", "quality"]);
}

// ─── Setup ───

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let stdout = run_ok(&config_path, &["init"]);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_pgh(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_pgh(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_pgh(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config_path) = setup_test_env();
    let mut content = fs::read_to_string(&config_path).unwrap();
    content.push_str("title_boost = 0.5\n");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_pgh(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("retrieval.title_boost"));
}

// ─── Writes and reads ───

#[test]
fn test_add_and_get() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    let stdout = run_ok(&config_path, &["get", "https://www.lorem.com/test1"]);
    let page: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(page["url"], "lorem.com/test1");
    assert_eq!(page["domain"], "lorem.com");
    assert_eq!(page["title"], "Another");
    assert_eq!(page["has_bookmark"], true);
    assert_eq!(page["visits"].as_array().unwrap().len(), 1);
}

#[test]
fn test_get_not_found() {
    let (_tmp, config_path) = setup_test_env();
    run_ok(&config_path, &["init"]);

    let stdout = run_ok(&config_path, &["get", "nothing.com/here"]);
    assert!(stdout.contains("Not found."));
}

#[test]
fn test_search_text_and_negation() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    let res = search_json(&config_path, &["dummy"]);
    assert_eq!(result_urls(&res).len(), 3);
    assert_eq!(res["results_exhausted"], true);

    let res = search_json(&config_path, &["dummy -ipsum"]);
    let urls = result_urls(&res);
    assert_eq!(urls.len(), 2);
    assert!(!urls.contains(&"lorem.com/test2".to_string()));

    let res = search_json(&config_path, &["hen"]);
    assert_eq!(result_urls(&res), vec!["test.com/test"]);
}

#[test]
fn test_search_filters() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    let res = search_json(&config_path, &["--domain", "lorem.com"]);
    let mut urls = result_urls(&res);
    urls.sort();
    assert_eq!(urls, vec!["lorem.com/test1", "lorem.com/test2"]);

    let res = search_json(&config_path, &["--exclude-domain", "lorem.com"]);
    assert_eq!(result_urls(&res), vec!["test.com/test"]);

    let res = search_json(&config_path, &["--tag", "good"]);
    assert_eq!(result_urls(&res), vec!["test.com/test"]);

    let res = search_json(&config_path, &["--bookmarks"]);
    assert_eq!(result_urls(&res), vec!["lorem.com/test1"]);

    let end = (T0 + 90_000).to_string();
    let res = search_json(&config_path, &["--end", &end]);
    let mut urls = result_urls(&res);
    urls.sort();
    assert_eq!(urls, vec!["lorem.com/test1", "lorem.com/test2"]);
}

#[test]
fn test_search_pagination_and_count() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    let first = search_json(&config_path, &["--limit", "2", "--count"]);
    assert_eq!(result_urls(&first).len(), 2);
    assert_eq!(first["total_count"], 3);
    assert_eq!(first["results_exhausted"], false);

    let rest = search_json(&config_path, &["--limit", "2", "--skip", "2"]);
    assert_eq!(result_urls(&rest).len(), 1);
    assert_eq!(rest["results_exhausted"], true);
    assert!(rest.get("total_count").is_none());
}

#[test]
fn test_search_text_output() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    let stdout = run_ok(&config_path, &["search", "hen"]);
    assert!(stdout.contains("1. Test"));
    assert!(stdout.contains("url: test.com/test"));
    assert!(stdout.contains("tags: good, quality"));

    let stdout = run_ok(&config_path, &["search", "zebra"]);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_tag_and_untag() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    let stdout = run_ok(&config_path, &["untag", "test.com/test", "good"]);
    assert!(stdout.contains("Untagged"));
    let res = search_json(&config_path, &["--tag", "good"]);
    assert!(result_urls(&res).is_empty());

    // Page survives losing a tag.
    let stdout = run_ok(&config_path, &["get", "test.com/test"]);
    assert!(!stdout.contains("Not found."));
}

#[test]
fn test_unbookmark_cascades_only_without_visits() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    run_ok(&config_path, &["bookmark", "only-bookmarked.com/x", "--time", "5"]);
    run_ok(&config_path, &["unbookmark", "only-bookmarked.com/x"]);
    let stdout = run_ok(&config_path, &["get", "only-bookmarked.com/x"]);
    assert!(stdout.contains("Not found."));

    run_ok(&config_path, &["unbookmark", "lorem.com/test1"]);
    let stdout = run_ok(&config_path, &["get", "lorem.com/test1"]);
    assert!(!stdout.contains("Not found."));
}

#[test]
fn test_unvisit_deletes_last_visit() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    let v3 = (T0 + 180_000).to_string();
    run_ok(&config_path, &["unvisit", "test.com/test", "--time", &v3]);
    let stdout = run_ok(&config_path, &["get", "test.com/test"]);
    assert!(stdout.contains("Not found."));
    let res = search_json(&config_path, &["--tag", "quality"]);
    assert!(result_urls(&res).is_empty());
}

#[test]
fn test_delete_by_url_domain_and_pattern() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    let stdout = run_ok(&config_path, &["delete", "lorem.com/test2"]);
    assert!(stdout.contains("Deleted 1 page(s)."));

    let stdout = run_ok(&config_path, &["delete", "--domain", "lorem.com"]);
    assert!(stdout.contains("Deleted 1 page(s)."));

    let stdout = run_ok(&config_path, &["delete", "--pattern", "(?i)^TEST"]);
    assert!(stdout.contains("Deleted 1 page(s)."));

    let res = search_json(&config_path, &[]);
    assert!(result_urls(&res).is_empty());

    let (_, stderr, success) = run_pgh(&config_path, &["delete", "--pattern", "(unclosed"]);
    assert!(!success);
    assert!(stderr.contains("invalid URL pattern"));
}

#[test]
fn test_delete_requires_selector() {
    let (_tmp, config_path) = setup_test_env();
    run_ok(&config_path, &["init"]);

    let (_, stderr, success) = run_pgh(&config_path, &["delete"]);
    assert!(!success);
    assert!(stderr.contains("Nothing to delete"));
}

#[test]
fn test_add_terms() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    run_ok(&config_path, &["add-terms", "test.com/test", "--text", "zebra crossing"]);
    let res = search_json(&config_path, &["zebra"]);
    assert_eq!(result_urls(&res), vec!["test.com/test"]);

    let (_, stderr, success) = run_pgh(&config_path, &["add-terms", "new.com/page", "--text", "x"]);
    assert!(!success);
    assert!(stderr.contains("unknown page"));
}

#[test]
fn test_suggest() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    let stdout = run_ok(&config_path, &["suggest", "lo", "--field", "domain"]);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["lorem.com"]);

    let stdout = run_ok(&config_path, &["suggest", "", "--field", "tag"]);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["good", "quality"]);

    let (_, _, success) = run_pgh(&config_path, &["suggest", "x", "--field", "title"]);
    assert!(!success);
}

// ─── Bulk and maintenance ───

#[test]
fn test_import_jsonl() {
    let (tmp, config_path) = setup_test_env();
    run_ok(&config_path, &["init"]);

    let file = tmp.path().join("pages.jsonl");
    fs::write(
        &file,
        concat!(
            r#"{"url":"https://alpha.com/a","title":"Alpha","text":"rust crates","visits":[1000],"tags":["lang"]}"#,
            "\n",
            r#"{"url":"beta.org/b","text":"python notebooks","bookmark":2000}"#,
            "\n",
            "garbage\n",
        ),
    )
    .unwrap();

    let stdout = run_ok(&config_path, &["import", file.to_str().unwrap()]);
    assert!(stdout.contains("Imported 2 pages (1 skipped)"));

    let res = search_json(&config_path, &["rust"]);
    assert_eq!(result_urls(&res), vec!["alpha.com/a"]);
    let res = search_json(&config_path, &["--tag", "lang"]);
    assert_eq!(result_urls(&res), vec!["alpha.com/a"]);
}

#[test]
fn test_check_and_stats() {
    let (_tmp, config_path) = setup_test_env();
    seed(&config_path);

    let stdout = run_ok(&config_path, &["check"]);
    assert!(stdout.contains("Index OK."));

    let stdout = run_ok(&config_path, &["stats", "--json"]);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["tables"]["pages"], 3);
    assert_eq!(stats["tables"]["visits"], 3);
    assert_eq!(stats["tables"]["bookmarks"], 1);
    assert_eq!(stats["tables"]["tags"], 2);
    assert_eq!(stats["index"]["documents"], 3);

    let stdout = run_ok(&config_path, &["stats"]);
    assert!(stdout.contains("Pages:"));
}

#[test]
fn test_commands_before_init_fail() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_pgh(&config_path, &["search", "x"]);
    assert!(!success);
    assert!(stderr.contains("pgh init"));
}
