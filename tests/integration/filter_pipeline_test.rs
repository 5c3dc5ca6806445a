use crate::utils::{Fixture, RawPrescription, dates, read_output, strings, ymd};
use rx_clean::schema::{
    BNF_CODE_CLEAN, BRAND_NAME, DMD_CODE, DRUG_NAME, GENERIC_NAME, ISSUE_DATE, PARTICIPANT_ID,
    READ_2,
};
use rx_clean::{InputPaths, Stage, run_filter_pipeline};

fn inputs(fixture: &Fixture) -> InputPaths {
    InputPaths {
        demographics: fixture.path("demographics.parquet"),
        prescriptions: fixture.prescription_dir(),
    }
}

fn standard_fixture() -> Fixture {
    let fixture = Fixture::new();
    fixture.write_demographics(&[
        (1, Some("1950-04-10")),
        (2, Some("12-09-1961")),
        (3, Some("1900-01-01")),
        (5, Some("1970-01-01")),
        (5, Some("1970-01-01")),
    ]);
    fixture.write_patterns(&["Simvastatin", "atorvastatin", "statin test"]);
    fixture.write_prescriptions(
        "part-0.parquet",
        &[
            RawPrescription::new(1, "Simvastatin 40mg tablets", "0212.00.00", "1902-02-02")
                .read_2("bxi3.00")
                .dmd_code(39_113_611),
            RawPrescription::new(1, "Testing strips", "0212.01.00", "2015-01-01"),
            RawPrescription::new(2, "Atorvastatin 10mg", "", "1900-01-01"),
        ],
    );
    fixture.write_prescriptions(
        "part-1.parquet",
        &[
            RawPrescription::new(2, "Paracetamol 500mg", "0407", "2016-05-05").read_2("123400"),
            RawPrescription::new(2, "Lipid regulator", "0212.03", "07-07-2020").read_2("123400"),
            RawPrescription::new(3, "Statin Test kit", "2104", "1903-03-03"),
            RawPrescription::new(4, "simvastatin", "0212", "1903-03-03"),
            RawPrescription::new(5, "simvastatin", "0212", "1902-02-02"),
        ],
    );
    fixture
}

/// Test the full filter pipeline from raw extracts to the published output
#[tokio::test]
async fn test_filter_pipeline_end_to_end() -> rx_clean::Result<()> {
    let fixture = standard_fixture();
    let output = fixture.path("out/statins_2024.parquet");
    let alias = fixture.path("out/statins.parquet");

    let report =
        run_filter_pipeline(&fixture.config(), &inputs(&fixture), &output, &alias).await?;

    let batch = read_output(&output);
    assert_eq!(batch.schema(), rx_clean::schema::matched_schema());
    assert_eq!(
        strings(&batch, PARTICIPANT_ID),
        vec![Some("1".to_string()), Some("2".to_string())]
    );
    assert_eq!(
        strings(&batch, DRUG_NAME),
        vec![
            Some("Simvastatin 40mg tablets".to_string()),
            Some("Lipid regulator".to_string())
        ]
    );
    assert_eq!(dates(&batch, ISSUE_DATE), vec![ymd(1950, 4, 10), ymd(2020, 7, 7)]);
    assert_eq!(
        strings(&batch, BNF_CODE_CLEAN),
        vec![Some("02120000".to_string()), Some("021203".to_string())]
    );
    assert_eq!(
        strings(&batch, READ_2),
        vec![Some("bxi3.".to_string()), Some("1234".to_string())]
    );
    assert_eq!(strings(&batch, DMD_CODE), vec![Some("39113611".to_string()), None]);
    assert_eq!(strings(&batch, GENERIC_NAME), vec![Some("simvastatin".to_string()), None]);
    assert_eq!(strings(&batch, BRAND_NAME), vec![None, None]);

    let normalize = report.normalize;
    assert_eq!(normalize.rows_in, 8);
    assert_eq!(normalize.rows_out, 4);
    assert_eq!(normalize.missing_sentinel, 2);
    assert_eq!(normalize.lookup_not_found, 2);
    assert_eq!(normalize.dob_substituted, 1);
    assert_eq!(report.ambiguous_participants, 1);

    let matched = report.matched.expect("filter report has match stats");
    assert_eq!(matched.rows_in, 4);
    assert_eq!(matched.matched_by_name, 1);
    assert_eq!(matched.matched_by_code_only, 1);
    assert_eq!(matched.excluded_code_matches, 1);
    assert_eq!(matched.names.generic_from_name, 1);
    assert_eq!(matched.names.unnamed, 1);
    assert_eq!(report.rows_written, 2);

    #[cfg(unix)]
    {
        assert!(std::fs::symlink_metadata(&alias).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::canonicalize(&alias).unwrap(), std::fs::canonicalize(&output).unwrap());
    }
    Ok(())
}

/// Test that the run report is written as JSON
#[tokio::test]
async fn test_run_report_json() -> rx_clean::Result<()> {
    let fixture = standard_fixture();
    let output = fixture.path("statins_1.parquet");
    let alias = fixture.path("statins.parquet");
    let report_path = fixture.path("report.json");

    let report = run_filter_pipeline(&fixture.config(), &inputs(&fixture), &output, &alias).await?;
    report.write_json(&report_path)?;

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).expect("valid JSON");
    assert_eq!(json["pipeline"], "filter");
    assert_eq!(json["normalize"]["rows_out"], 4);
    assert_eq!(json["matched"]["rows_out"], 2);
    assert_eq!(json["matched"]["names"]["generic_from_name"], 1);
    assert_eq!(json["alias"], alias.display().to_string());
    Ok(())
}

/// Test that a failing batch aborts the run without publishing anything
#[tokio::test]
async fn test_failed_stage_publishes_nothing() {
    let fixture = standard_fixture();
    let bad = fixture.write_malformed_prescriptions("part-2.parquet");
    let output = fixture.path("out/statins.parquet");
    let alias = fixture.path("out/current.parquet");

    let err = run_filter_pipeline(&fixture.config(), &inputs(&fixture), &output, &alias)
        .await
        .expect_err("malformed issue_date column must fail the run");

    assert_eq!(err.stage(), Some(Stage::Normalize));
    let message = err.to_string();
    assert!(message.contains("normalize"), "{message}");
    assert!(message.contains(&bad.display().to_string()), "{message}");

    assert!(!output.exists());
    assert!(std::fs::symlink_metadata(&alias).is_err());
    let out_dir = fixture.path("out");
    if out_dir.exists() {
        assert_eq!(std::fs::read_dir(out_dir).unwrap().count(), 0);
    }
}

/// Test that a missing term directory fails before any input is read
#[tokio::test]
async fn test_missing_patterns_fail_early() {
    let fixture = standard_fixture();
    let mut config = fixture.config();
    config.pattern_dir = Some(fixture.path("no-such-dir"));
    let output = fixture.path("statins_1.parquet");
    let alias = fixture.path("statins.parquet");

    let err = run_filter_pipeline(&config, &inputs(&fixture), &output, &alias)
        .await
        .expect_err("missing pattern directory");

    assert_eq!(err.stage(), Some(Stage::LoadPatterns));
    assert!(!output.exists());
}

/// Test that rerunning replaces the output and repoints the alias
#[cfg(unix)]
#[tokio::test]
async fn test_alias_follows_latest_run() -> rx_clean::Result<()> {
    let fixture = standard_fixture();
    let alias = fixture.path("statins.parquet");
    let first = fixture.path("statins_run1.parquet");
    let second = fixture.path("statins_run2.parquet");

    run_filter_pipeline(&fixture.config(), &inputs(&fixture), &first, &alias).await?;
    run_filter_pipeline(&fixture.config(), &inputs(&fixture), &second, &alias).await?;

    assert_eq!(std::fs::canonicalize(&alias).unwrap(), std::fs::canonicalize(&second).unwrap());
    assert!(first.exists());
    Ok(())
}

/// Test that an alias path holding a regular file fails the run and writes no output
#[tokio::test]
async fn test_unreplaceable_alias_writes_nothing() {
    let fixture = standard_fixture();
    let output = fixture.path("statins_1.parquet");
    let alias = fixture.path("statins.parquet");
    std::fs::write(&alias, b"not a link").unwrap();

    let err = run_filter_pipeline(&fixture.config(), &inputs(&fixture), &output, &alias)
        .await
        .expect_err("a regular file at the alias path must not be replaced");

    assert_eq!(err.stage(), Some(Stage::Publish));
    assert!(!output.exists());
    assert_eq!(std::fs::read(&alias).unwrap(), b"not a link");
}

/// Test that an alias equal to the output path is refused
#[tokio::test]
async fn test_alias_must_differ_from_output() {
    let fixture = standard_fixture();
    let output = fixture.path("statins.parquet");

    let err = run_filter_pipeline(&fixture.config(), &inputs(&fixture), &output, &output)
        .await
        .expect_err("alias equal to output");

    assert_eq!(err.stage(), Some(Stage::Publish));
    assert!(!output.exists());
}

/// Test brand-only drug names are standardised to their generic name
#[tokio::test]
async fn test_brand_names_are_standardised() -> rx_clean::Result<()> {
    let fixture = Fixture::new();
    fixture.write_demographics(&[(1, Some("1950-04-10"))]);
    fixture.write_patterns(&["simvastatin", "zocor", "lipitor"]);
    fixture.write_prescriptions(
        "part-0.parquet",
        &[
            RawPrescription::new(1, "Zocor 20mg tablets", "", "2015-01-01"),
            RawPrescription::new(1, "LIPITOR 10MG (atorvastatin)", "", "2016-01-01"),
        ],
    );
    let output = fixture.path("statins_1.parquet");
    let alias = fixture.path("statins.parquet");

    let report = run_filter_pipeline(&fixture.config(), &inputs(&fixture), &output, &alias).await?;

    let batch = read_output(&output);
    assert_eq!(
        strings(&batch, GENERIC_NAME),
        vec![Some("simvastatin".to_string()), Some("atorvastatin".to_string())]
    );
    assert_eq!(
        strings(&batch, BRAND_NAME),
        vec![Some("zocor".to_string()), Some("lipitor".to_string())]
    );
    let names = report.matched.expect("match stats").names;
    assert_eq!(names.generic_from_brand, 1);
    assert_eq!(names.generic_from_name, 1);
    Ok(())
}
