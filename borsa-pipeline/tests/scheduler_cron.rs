use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Europe::Istanbul;

use borsa_common::config::ScheduleTimes;
use borsa_pipeline::scheduler::{JobKind, ScheduleJob};

fn istanbul(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Istanbul
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn test_default_schedule_fire_times() {
    let jobs = ScheduleJob::from_config(&ScheduleTimes::default(), Istanbul).unwrap();
    // Saturday noon
    let now = istanbul(2024, 5, 4, 12, 0);

    let next: Vec<(JobKind, DateTime<Utc>)> = jobs
        .iter()
        .map(|j| (j.kind, j.next_after(now).unwrap()))
        .collect();

    assert_eq!(next[0], (JobKind::ScreenAll, istanbul(2024, 5, 4, 18, 30)));
    assert_eq!(next[1], (JobKind::PredictSelected, istanbul(2024, 5, 4, 20, 0)));
    assert_eq!(next[2], (JobKind::WeeklyReport, istanbul(2024, 5, 6, 9, 0)));
}

#[test]
fn test_custom_weekday_schedule() {
    let times = ScheduleTimes {
        screen: "0 45 18 * * Mon,Tue,Wed,Thu,Fri".into(),
        predict: "0 15 19 * * Mon,Tue,Wed,Thu,Fri".into(),
        report: "0 0 10 * * Sun".into(),
    };
    let jobs = ScheduleJob::from_config(&times, Istanbul).unwrap();
    // Friday after the screen time
    let next = jobs[0].next_after(istanbul(2024, 5, 3, 19, 0)).unwrap();
    assert_eq!(next, istanbul(2024, 5, 6, 18, 45));
}

#[test]
fn test_bad_expression_names_the_job() {
    let times = ScheduleTimes {
        predict: "0 99 20 * * *".into(),
        ..ScheduleTimes::default()
    };
    let err = ScheduleJob::from_config(&times, Istanbul).unwrap_err();
    assert!(err.to_string().contains("predict_selected"));
}
