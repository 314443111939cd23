//! Schema and configuration diagnostics through the public API.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use archon_dal::config::MapSource;
use archon_dal::validation::{DatabaseConfigValidation, Severity, rules_for};
use archon_dal::{DatabaseConfigValidator, DatabaseSchemaValidator, DatabaseType};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use std::sync::Arc;

fn validator(pairs: &[(&str, &str)]) -> DatabaseConfigValidator {
    let source: MapSource = pairs.iter().copied().collect();
    DatabaseConfigValidator::new(Arc::new(source))
}

fn jwt(role: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({"role": role, "iss": "supabase"}).to_string());
    format!("{header}.{payload}.signature")
}

/// Reads `KEY=value` lines the way a `.env` loader would.
fn parse_env_template(template: &str) -> MapSource {
    template
        .lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .filter_map(|line| line.split_once('='))
        .collect()
}

fn severities(report: &DatabaseConfigValidation) -> Vec<Option<Severity>> {
    report.results.iter().map(|r| r.severity).collect()
}

#[test]
fn every_database_gets_a_report_for_every_table() {
    let reports = DatabaseSchemaValidator::new().validate_all_adapters();
    assert_eq!(reports.len(), DatabaseType::ALL.len());
    for (database, results) in &reports {
        let mut tables: Vec<&str> = results.iter().map(|r| r.table_name.as_str()).collect();
        tables.dedup();
        assert_eq!(tables.len(), 6, "{database}");
        assert!(results.iter().all(|r| r.compatible), "{database}");
    }
}

#[test]
fn fallback_databases_explain_vector_storage() {
    let validator = DatabaseSchemaValidator::new();
    for database in [DatabaseType::Mysql, DatabaseType::Sqlite] {
        let results = validator.validate_adapter(database);
        let vector_warnings = results
            .iter()
            .flat_map(|r| &r.warnings)
            .filter(|w| w.contains("has no native type"))
            .count();
        assert!(vector_warnings >= 2, "{database}: {vector_warnings}");
    }
    let postgres = validator.validate_adapter(DatabaseType::Postgresql);
    assert!(postgres.iter().all(|r| r.issues.is_empty()));
}

#[test]
fn schema_reports_serialize_with_lowercase_database_names() {
    let results = DatabaseSchemaValidator::new().validate_adapter(DatabaseType::Sqlite);
    let value = serde_json::to_value(&results).unwrap();
    let first = &value.as_array().unwrap()[0];
    assert_eq!(first["database_type"], "sqlite");
    assert!(first["compatible"].as_bool().unwrap());
    assert!(first["warnings"].is_array());
}

#[test]
fn migration_scripts_cover_each_target() {
    let validator = DatabaseSchemaValidator::new();
    for target in DatabaseType::ALL {
        let script = validator.generate_migration_script(DatabaseType::Supabase, target);
        assert!(script.starts_with(&format!("-- Archon schema migration: supabase -> {target}")));
        assert_eq!(script.matches("CREATE TABLE").count(), 6, "{target}");
    }
}

#[test]
fn supabase_with_service_role_key_is_clean() {
    let report = validator(&[
        ("SUPABASE_URL", "https://abc.supabase.co"),
        ("SUPABASE_SERVICE_KEY", &jwt("service_role")),
    ])
    .validate_database(DatabaseType::Supabase);
    assert!(report.valid);
    assert_eq!(report.score, 100);
    assert_eq!(severities(&report), vec![None, None]);
}

#[test]
fn supabase_anon_key_is_rejected() {
    let report = validator(&[
        ("SUPABASE_URL", "https://abc.supabase.co"),
        ("SUPABASE_SERVICE_KEY", &jwt("anon")),
    ])
    .validate_database(DatabaseType::Supabase);
    assert!(!report.valid);
    assert_eq!(report.error_count(), 1);
    let key = report
        .results
        .iter()
        .find(|r| r.field == "SUPABASE_SERVICE_KEY")
        .unwrap();
    assert!(key.message.contains("anon"));
}

#[test]
fn plain_http_supabase_url_only_warns() {
    let report = validator(&[
        ("SUPABASE_URL", "http://supabase.internal:8000"),
        ("SUPABASE_SERVICE_KEY", &jwt("service_role")),
    ])
    .validate_database(DatabaseType::Supabase);
    assert!(report.valid);
    assert_eq!(report.warning_count(), 1);
    assert_eq!(report.score, 95);
}

#[test]
fn postgres_findings_accumulate() {
    let report = validator(&[
        ("POSTGRES_HOST", "db.internal"),
        ("POSTGRES_PORT", "70000"),
        ("POSTGRES_DB", "archon"),
        ("POSTGRES_USER", "archon"),
        ("POSTGRES_PASSWORD", "short"),
        ("POSTGRES_SSL_MODE", "require"),
    ])
    .validate_database(DatabaseType::Postgresql);
    assert!(!report.valid);
    assert_eq!(report.error_count(), 1);
    assert_eq!(report.warning_count(), 1);
    assert_eq!(report.score, 75);

    let port = report.results.iter().find(|r| r.field == "POSTGRES_PORT").unwrap();
    assert_eq!(port.suggested_value.as_deref(), Some("5432"));
    let pool = report.results.iter().find(|r| r.field == "POSTGRES_POOL_SIZE").unwrap();
    assert_eq!(pool.severity, Some(Severity::Info));
    assert!(pool.valid);
}

#[test]
fn current_selection_follows_database_type() {
    let report = validator(&[("DATABASE_TYPE", "SQLite")]).get_current_database_validation();
    assert_eq!(report.database_type, "sqlite");
    assert!(report.valid);

    let report = validator(&[]).get_current_database_validation();
    assert_eq!(report.database_type, "supabase");
    assert_eq!(report.error_count(), 2);

    let report = validator(&[("DATABASE_TYPE", "oracle")]).get_current_database_validation();
    assert!(!report.valid);
    assert_eq!(report.results[0].field, "DATABASE_TYPE");
    assert_eq!(report.results[0].suggested_value.as_deref(), Some("supabase"));
}

#[test]
fn sqlite_template_validates_as_written() {
    let template = DatabaseConfigValidator::new(Arc::new(MapSource::new()))
        .export_configuration_template(DatabaseType::Sqlite);
    let filled = DatabaseConfigValidator::new(Arc::new(parse_env_template(&template)));

    let current = filled.get_current_database_validation();
    assert_eq!(current.database_type, "sqlite");
    assert!(current.valid);
    assert_eq!(current.score, 100);
    assert!(current.results.iter().all(|r| r.severity.is_none()));
}

#[test]
fn postgres_template_lists_every_rule() {
    let template = DatabaseConfigValidator::new(Arc::new(MapSource::new()))
        .export_configuration_template(DatabaseType::Postgresql);
    for rule in rules_for(DatabaseType::Postgresql) {
        assert!(template.contains(&format!("\n{}=", rule.field)), "{}", rule.field);
    }

    let report = DatabaseConfigValidator::new(Arc::new(parse_env_template(&template)))
        .validate_database(DatabaseType::Postgresql);
    assert_eq!(report.error_count(), 4);
    assert_eq!(report.score, 20);
}

#[test]
fn config_reports_serialize_severity_in_lowercase() {
    let report = validator(&[]).validate_database(DatabaseType::Sqlite);
    let value: Value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["database_type"], "sqlite");
    assert_eq!(value["results"][0]["severity"], "info");
}
