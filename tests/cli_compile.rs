use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

use serde_json::{Value, json};

fn searchbridge_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(bin) = std::env::var("CARGO_BIN_EXE_searchbridge") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("searchbridge");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}

fn run(args: &[&str]) -> Result<Output, Box<dyn std::error::Error>> {
    Ok(Command::new(searchbridge_bin()?)
        .args(args)
        .env_remove("SEARCHBRIDGE_CONFIG")
        .env_remove("SEARCHBRIDGE_LOG")
        .output()?)
}

fn write_predicates(
    dir: &Path,
    predicates: &Value,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = dir.join("predicates.json");
    std::fs::write(&path, serde_json::to_string(predicates)?)?;
    Ok(path)
}

#[test]
fn compile_prints_the_search_request() -> Result<(), Box<dyn std::error::Error>>
{
    let tempdir = tempfile::tempdir()?;
    let path = write_predicates(
        tempdir.path(),
        &json!({
            "index": "books",
            "query": "rust",
            "fields": ["title"],
            "where": {"language": "en"},
            "where_in": {"format": ["epub", "pdf"]},
            "ranges": {"year": {"gte": 2015}},
            "orders": [{"field": "year", "direction": "desc"}],
            "limit": 20
        }),
    )?;

    let output = run(&["compile", path.to_str().ok_or("non-utf8 path")?])?;
    assert!(
        output.status.success(),
        "compile failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let body: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(
        body,
        json!({
            "_source": true,
            "size": 20,
            "from": 0,
            "query": {
                "bool": {
                    "must": [{
                        "simple_query_string": {
                            "query": "rust",
                            "fields": ["title"],
                            "default_operator": "and"
                        }
                    }],
                    "filter": [
                        {"term": {"__soft_deleted": 0}},
                        {"term": {"language": "en"}},
                        {"range": {"year": {"gte": 2015}}}
                    ],
                    "should": [
                        {"term": {"format": "epub"}},
                        {"term": {"format": "pdf"}}
                    ],
                    "minimum_should_match": 1
                }
            },
            "sort": [{"year": {"order": "desc"}}]
        })
    );
    Ok(())
}

#[test]
fn compile_paginated_request() -> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    let path =
        write_predicates(tempdir.path(), &json!({"index": "books"}))?;

    let output = run(&[
        "compile",
        path.to_str().ok_or("non-utf8 path")?,
        "--page",
        "3",
        "--per-page",
        "15",
    ])?;
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(body["size"], json!(15));
    assert_eq!(body["from"], json!(30));
    assert!(body.get("sort").is_none());
    Ok(())
}

#[test]
fn compile_needs_no_config() -> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    let path =
        write_predicates(tempdir.path(), &json!({"distinct": "brand"}))?;

    let output = run(&[
        "compile",
        path.to_str().ok_or("non-utf8 path")?,
        "--config",
        tempdir.path().join("absent.json").to_str().ok_or("non-utf8")?,
    ])?;
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(body["stored_fields"], json!("brand"));
    assert_eq!(
        body["aggregations"]["brand"]["terms"]["field"],
        json!("brand.raw")
    );
    Ok(())
}

#[test]
fn compile_missing_predicate_file_fails()
-> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    let missing = tempdir.path().join("missing.json");

    let output = run(&["compile", missing.to_str().ok_or("non-utf8 path")?])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("NotFound"));
    Ok(())
}

#[test]
fn search_with_missing_config_fails() -> Result<(), Box<dyn std::error::Error>>
{
    let tempdir = tempfile::tempdir()?;
    let path = write_predicates(tempdir.path(), &json!({"index": "books"}))?;
    let config = tempdir.path().join("absent.json");

    let output = run(&[
        "search",
        path.to_str().ok_or("non-utf8 path")?,
        "--config",
        config.to_str().ok_or("non-utf8 path")?,
    ])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ConfigFile"));
    Ok(())
}
