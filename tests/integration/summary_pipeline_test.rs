use crate::utils::{Fixture, RawPrescription, dates, read_output, strings, ymd};
use rx_clean::aggregate::summaries_from_record_batch;
use rx_clean::schema::{MAX_ISSUE_DATE, MIN_ISSUE_DATE, PARTICIPANT_ID};
use rx_clean::{InputPaths, ParticipantDateSummary, Stage, run_summary_pipeline};

fn inputs(fixture: &Fixture) -> InputPaths {
    InputPaths {
        demographics: fixture.path("demographics.parquet"),
        prescriptions: fixture.prescription_dir(),
    }
}

/// Test per-participant first and last dates across files and batches
#[tokio::test]
async fn test_summary_pipeline_end_to_end() -> rx_clean::Result<()> {
    let fixture = Fixture::new();
    fixture.write_demographics(&[(10, Some("1948-11-30")), (20, None)]);
    fixture.write_prescriptions(
        "a.parquet",
        &[
            RawPrescription::new(20, "Aspirin", "0209", "2015-01-01"),
            RawPrescription::new(10, "Simvastatin", "0212", "2015-01-01"),
            RawPrescription::new(20, "Aspirin", "0209", "2018-06-15"),
        ],
    );
    fixture.write_prescriptions(
        "b.parquet",
        &[
            RawPrescription::new(20, "Aspirin", "0209", "03-03-2010"),
            RawPrescription::new(10, "Simvastatin", "0212", "1902-02-02"),
            // participant 20 has no date of birth: dropped
            RawPrescription::new(20, "Aspirin", "0209", "1903-03-03"),
            // only record of participant 30 is a missing sentinel
            RawPrescription::new(30, "Aspirin", "0209", "2037-07-07"),
        ],
    );
    let output = fixture.path("summary.parquet");

    let report = run_summary_pipeline(&fixture.config(), &inputs(&fixture), &output).await?;

    let batch = read_output(&output);
    assert_eq!(batch.schema(), rx_clean::schema::summary_schema());
    assert_eq!(
        strings(&batch, PARTICIPANT_ID),
        vec![Some("10".to_string()), Some("20".to_string())]
    );
    assert_eq!(dates(&batch, MIN_ISSUE_DATE), vec![ymd(1948, 11, 30), ymd(2010, 3, 3)]);
    assert_eq!(dates(&batch, MAX_ISSUE_DATE), vec![ymd(2015, 1, 1), ymd(2018, 6, 15)]);

    assert_eq!(
        summaries_from_record_batch(&batch)?,
        vec![
            ParticipantDateSummary {
                participant_id: "10".to_string(),
                min_issue_date: ymd(1948, 11, 30),
                max_issue_date: ymd(2015, 1, 1),
            },
            ParticipantDateSummary {
                participant_id: "20".to_string(),
                min_issue_date: ymd(2010, 3, 3),
                max_issue_date: ymd(2018, 6, 15),
            },
        ]
    );

    assert_eq!(report.summarised_participants, Some(2));
    assert!(report.matched.is_none());
    assert_eq!(report.normalize.rows_in, 7);
    assert_eq!(report.normalize.lookup_not_found, 1);
    assert_eq!(report.normalize.missing_sentinel, 1);
    Ok(())
}

/// Test that summarising needs no curated term list
#[tokio::test]
async fn test_summary_ignores_pattern_directory() -> rx_clean::Result<()> {
    let fixture = Fixture::new();
    fixture.write_demographics(&[(1, Some("1950-01-01"))]);
    fixture.write_prescriptions(
        "a.parquet",
        &[RawPrescription::new(1, "Anything", "", "2001-02-03")],
    );
    let mut config = fixture.config();
    config.pattern_dir = None;
    let output = fixture.path("summary.parquet");

    let report = run_summary_pipeline(&config, &inputs(&fixture), &output).await?;
    assert_eq!(report.rows_written, 1);
    Ok(())
}

/// Test that an empty normalized stream still writes a valid empty file
#[tokio::test]
async fn test_summary_of_nothing_is_empty_file() -> rx_clean::Result<()> {
    let fixture = Fixture::new();
    fixture.write_demographics(&[(1, Some("1950-01-01"))]);
    fixture.write_prescriptions(
        "a.parquet",
        &[RawPrescription::new(1, "Anything", "", "1900-01-01")],
    );
    let output = fixture.path("summary.parquet");

    let report = run_summary_pipeline(&fixture.config(), &inputs(&fixture), &output).await?;
    assert_eq!(report.rows_written, 0);

    let batches = rx_clean::utils::read_parquet(&output, None, 1024)?;
    assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 0);
    Ok(())
}

/// Test that a missing demographic column is reported against its stage and file
#[tokio::test]
async fn test_missing_demographic_column_fails_load() {
    let fixture = Fixture::new();
    fixture.write_demographics(&[(1, Some("1950-01-01"))]);
    fixture.write_prescriptions(
        "a.parquet",
        &[RawPrescription::new(1, "Anything", "", "2001-02-03")],
    );
    let mut config = fixture.config();
    config.columns.date_of_birth = "dob".to_string();
    let output = fixture.path("summary.parquet");

    let err = run_summary_pipeline(&config, &inputs(&fixture), &output)
        .await
        .expect_err("projection must fail");

    assert_eq!(err.stage(), Some(Stage::LoadDemographics));
    assert!(err.to_string().contains("demographics.parquet"));
    assert!(!output.exists());
}
