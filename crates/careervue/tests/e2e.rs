//! End-to-end tests for the ingestion pipeline.
//!
//! Each case in `TEST_CASES` is a short mailbox history: messages arrive in
//! order, the classifier answers by subject, and one cycle runs. The
//! resulting single record is checked against the expectation.

mod common;

use chrono::NaiveDate;

use careervue::{ApplicationStatus, CycleOutcome, JobApplication};

use common::{acme, RawMessageBuilder, TestHarness};

struct Email {
    subject: &'static str,
    date: &'static str,
    status: &'static str,
    note: &'static str,
}

/// A single end-to-end test case.
struct TestCase {
    name: &'static str,
    emails: &'static [Email],
    expected_status: &'static str,
    expected_application_date: (i32, u32, u32),
    expected_last_updated: (i32, u32, u32),
    expected_notes: &'static str,
    expected_has_update: bool,
}

const TEST_CASES: &[TestCase] = &[
    TestCase {
        name: "interview_invite_creates_record",
        emails: &[Email {
            subject: "Your application to Acme",
            date: "Wed, 4 Feb 2026 09:00:00 +0000",
            status: "Interview",
            note: "Interview scheduled",
        }],
        expected_status: "Interview",
        expected_application_date: (2026, 2, 4),
        expected_last_updated: (2026, 2, 4),
        expected_notes: "Interview scheduled",
        expected_has_update: true,
    },
    TestCase {
        name: "applied_then_interview_changes_status",
        emails: &[
            Email {
                subject: "Thanks for applying",
                date: "Mon, 2 Feb 2026 09:00:00 +0000",
                status: "Applied",
                note: "Application received",
            },
            Email {
                subject: "Next steps",
                date: "Thu, 5 Feb 2026 14:30:00 +0000",
                status: "Interview",
                note: "Interview scheduled",
            },
        ],
        expected_status: "Interview",
        expected_application_date: (2026, 2, 2),
        expected_last_updated: (2026, 2, 5),
        expected_notes: "Application received\n\nInterview scheduled",
        expected_has_update: true,
    },
    TestCase {
        name: "applied_twice_keeps_status_and_appends_note",
        emails: &[
            Email {
                subject: "Thanks for applying",
                date: "Mon, 2 Feb 2026 09:00:00 +0000",
                status: "Applied",
                note: "Application received",
            },
            Email {
                subject: "Still reviewing",
                date: "Tue, 10 Feb 2026 08:00:00 +0000",
                status: "Applied",
                note: "Still under review",
            },
        ],
        expected_status: "Applied",
        expected_application_date: (2026, 2, 2),
        expected_last_updated: (2026, 2, 10),
        expected_notes: "Application received\n\nStill under review",
        expected_has_update: true,
    },
    TestCase {
        name: "rejection_after_offer",
        emails: &[
            Email {
                subject: "Offer",
                date: "Mon, 2 Feb 2026 09:00:00 +0000",
                status: "Offer",
                note: "Offer extended",
            },
            Email {
                subject: "Update on your application",
                date: "Fri, 6 Feb 2026 09:00:00 +0000",
                status: "Rejected",
                note: "Position filled",
            },
        ],
        expected_status: "Rejected",
        expected_application_date: (2026, 2, 2),
        expected_last_updated: (2026, 2, 6),
        expected_notes: "Offer extended\n\nPosition filled",
        expected_has_update: true,
    },
];

fn date((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn run_case(case: &TestCase) -> JobApplication {
    let mut harness = TestHarness::new();
    for (i, email) in case.emails.iter().enumerate() {
        harness.add_message(
            i as u32 + 1,
            RawMessageBuilder::new(email.subject).date(email.date).build(),
        );
        harness.answer(email.subject, acme(ApplicationStatus::parse(email.status), email.note));
    }

    let report = harness
        .run_cycle()
        .await
        .unwrap_or_else(|e| panic!("[{}] cycle failed: {}", case.name, e));
    assert_eq!(report.outcome, CycleOutcome::Completed, "[{}]", case.name);
    assert_eq!(report.created, 1, "[{}] created", case.name);

    let records = harness.ledger.store().list().unwrap();
    assert_eq!(records.len(), 1, "[{}] record count", case.name);
    records.into_iter().next().unwrap()
}

#[tokio::test]
async fn test_all_cases() {
    for case in TEST_CASES {
        let record = run_case(case).await;
        assert_eq!(record.company, "Acme", "[{}]", case.name);
        assert_eq!(record.position, "Backend Engineer", "[{}]", case.name);
        assert_eq!(record.status.as_str(), case.expected_status, "[{}] status", case.name);
        assert_eq!(
            record.application_date,
            date(case.expected_application_date),
            "[{}] application_date",
            case.name
        );
        assert_eq!(
            record.last_updated,
            date(case.expected_last_updated),
            "[{}] last_updated",
            case.name
        );
        assert_eq!(record.notes, case.expected_notes, "[{}] notes", case.name);
        assert_eq!(record.has_update, case.expected_has_update, "[{}]", case.name);
    }
}

#[tokio::test]
async fn test_acme_interview_second_cycle_creates_nothing() {
    let mut harness = TestHarness::new();
    harness.add_message(
        7,
        RawMessageBuilder::new("Your application to Acme")
            .date("Wed, 4 Feb 2026 09:00:00 +0000")
            .text("We would like to schedule an interview.")
            .build(),
    );
    harness.answer(
        "Your application to Acme",
        acme(ApplicationStatus::Interview, "Interview scheduled"),
    );

    let first = harness.run_cycle().await.unwrap();
    assert_eq!(first.created, 1);
    let after_first = harness.ledger.store().list().unwrap();

    let second = harness.run_cycle().await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(harness.classify_calls(), 1);
    assert_eq!(harness.ledger.store().list().unwrap(), after_first);
}
