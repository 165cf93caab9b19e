//! Two prebuilt trace configurations: the refresh trace (installed by the
//! Refresh Orchestrator for observability during a commit) and a standalone
//! query monitor.

use std::sync::Arc;

use tracing::{info, warn};

use crate::driver::{RawTraceEvent, TraceEventHandler, TraceEventSpec};

const REFRESH_INFO_SUBEVENTS: &[&str] = &[
    "TabularSequencePoint",
    "TabularRefresh",
    "Process",
    "VertiPaq",
    "CompressSegment",
    "TabularCommit",
    "RelationshipBuildPrepare",
    "AnalyzeEncodeData",
    "ReadData",
];

/// ProgressReport Begin/Current/End/Error plus the info-level sub-events the
/// original's refresh trace logged at INFO.
pub fn refresh_trace_events() -> Vec<TraceEventSpec> {
    let mut events = vec![
        TraceEventSpec {
            event_name: "ProgressReportBegin".to_string(),
            columns: vec!["ObjectName".to_string(), "StartTime".to_string()],
        },
        TraceEventSpec {
            event_name: "ProgressReportCurrent".to_string(),
            columns: vec!["ObjectName".to_string(), "IntegerData".to_string()],
        },
        TraceEventSpec {
            event_name: "ProgressReportEnd".to_string(),
            columns: vec!["ObjectName".to_string(), "IntegerData".to_string(), "Duration".to_string()],
        },
        TraceEventSpec {
            event_name: "ProgressReportError".to_string(),
            columns: vec!["ObjectName".to_string(), "TextData".to_string()],
        },
        TraceEventSpec {
            event_name: "SwitchingDictionary".to_string(),
            columns: vec!["ObjectName".to_string()],
        },
    ];
    events.extend(REFRESH_INFO_SUBEVENTS.iter().map(|name| TraceEventSpec {
        event_name: name.to_string(),
        columns: vec!["ObjectName".to_string(), "Duration".to_string()],
    }));
    events
}

fn cell_str(event: &RawTraceEvent, column: &str) -> String {
    event
        .columns
        .get(column)
        .map(|c| c.to_display_string())
        .unwrap_or_default()
}

/// Logs rows-read per partition on `ProgressReportCurrent`, total rows on
/// `ProgressReportEnd` (at WARN when zero), `SwitchingDictionary` at WARN, and
/// the selected sub-events at INFO.
pub fn refresh_trace_handler() -> TraceEventHandler {
    Arc::new(|event: RawTraceEvent| match event.event_name.as_str() {
        "ProgressReportCurrent" => {
            info!(
                object = %cell_str(&event, "ObjectName"),
                rows = %cell_str(&event, "IntegerData"),
                "rows read"
            );
        }
        "ProgressReportEnd" => {
            let object = cell_str(&event, "ObjectName");
            let total: i64 = cell_str(&event, "IntegerData").parse().unwrap_or(0);
            if total == 0 {
                warn!(object = %object, "partition refreshed with zero total rows");
            } else {
                info!(object = %object, total_rows = total, "partition refresh complete");
            }
        }
        "ProgressReportError" => {
            warn!(object = %cell_str(&event, "ObjectName"), message = %cell_str(&event, "TextData"), "refresh error reported");
        }
        "SwitchingDictionary" => {
            warn!(object = %cell_str(&event, "ObjectName"), "switching dictionary");
        }
        other if REFRESH_INFO_SUBEVENTS.contains(&other) => {
            info!(event = %other, object = %cell_str(&event, "ObjectName"), "refresh sub-event");
        }
        _ => {}
    })
}

pub fn query_monitor_events() -> Vec<TraceEventSpec> {
    vec![TraceEventSpec {
        event_name: "QueryEnd".to_string(),
        columns: vec![
            "NTUserName".to_string(),
            "ApplicationName".to_string(),
            "StartTime".to_string(),
            "EndTime".to_string(),
            "Duration".to_string(),
            "Error".to_string(),
            "Severity".to_string(),
        ],
    }]
}

/// Logs user, application, time window, duration and error for `QueryEnd`
/// events at `Severity == 3`.
pub fn query_monitor_handler() -> TraceEventHandler {
    Arc::new(|event: RawTraceEvent| {
        if event.event_name != "QueryEnd" {
            return;
        }
        if cell_str(&event, "Severity") != "3" {
            return;
        }
        info!(
            user = %cell_str(&event, "NTUserName"),
            application = %cell_str(&event, "ApplicationName"),
            start = %cell_str(&event, "StartTime"),
            end = %cell_str(&event, "EndTime"),
            duration = %cell_str(&event, "Duration"),
            error = %cell_str(&event, "Error"),
            "query completed"
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_trace_events_cover_progress_report_family() {
        let names: Vec<_> = refresh_trace_events().into_iter().map(|e| e.event_name).collect();
        assert!(names.contains(&"ProgressReportBegin".to_string()));
        assert!(names.contains(&"ProgressReportEnd".to_string()));
        assert!(names.contains(&"TabularCommit".to_string()));
    }

    #[test]
    fn query_monitor_subscribes_to_query_end_only() {
        let events = query_monitor_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name, "QueryEnd");
    }
}
