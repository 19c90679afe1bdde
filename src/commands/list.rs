//! `app list`: tabulate the apps of every pod.
//!
//! Listing is best effort. A pod whose facts cannot be read contributes an
//! entry to [`ListReport::errors`] instead of aborting the listing; only a
//! failure to enumerate the state directories is fatal.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pod::{Pod, PodDir, PodManifest, PodNetwork, walk_pods};
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{self, Write};
use tracing::debug;

/// State directories listed. Pods already in `garbage/` never ran and are
/// not shown.
const LISTED_DIRS: [PodDir; 4] = [
    PodDir::Prepare,
    PodDir::Prepared,
    PodDir::Run,
    PodDir::ExitedGarbage,
];

/// Shown when an app's image name cannot be determined.
const UNKNOWN_IMAGE: &str = "--";

/// Length of the image ID column in full output.
const IMAGE_ID_LEN: usize = 19;

const FULL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %z";

const ERROR_SEPARATOR: &str = "----------------------------------------";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Show image IDs and absolute timestamps.
    pub full: bool,
    /// Omit the header line.
    pub no_legend: bool,
    /// Only pods whose UUID starts with this.
    pub prefix: Option<String>,
}

/// One output line. Pod-level columns are filled on the pod's first app
/// only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRow {
    pub app: String,
    pub image_name: String,
    /// Empty unless full output was requested.
    pub image_id: String,
    pub state: String,
    pub created: String,
    pub started: String,
    pub networks: String,
}

/// Failure to read one pod during listing.
#[derive(Debug)]
pub struct ListError {
    /// Pod ID, when the pod could be opened.
    pub pod: Option<String>,
    pub error: Error,
}

impl fmt::Display for ListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pod {
            Some(pod) => write!(f, "pod {}: {}", pod, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

#[derive(Debug, Default)]
pub struct ListReport {
    pub rows: Vec<ListRow>,
    pub errors: Vec<ListError>,
}

/// Collects the listing.
pub fn list(config: &Config, opts: &ListOptions) -> Result<ListReport> {
    let prefix = opts.prefix.as_deref().map(str::to_ascii_lowercase);
    let mut report = ListReport::default();

    walk_pods(&config.data_dir, &LISTED_DIRS, |pod| {
        let pod = match pod {
            Ok(pod) => pod,
            Err(error) => {
                report.errors.push(ListError { pod: None, error });
                return;
            }
        };
        if let Some(prefix) = &prefix
            && !pod.id().as_str().starts_with(prefix.as_str())
        {
            return;
        }
        list_pod(&pod, opts, &mut report);
    })?;

    debug!(
        "Listed {} rows with {} errors",
        report.rows.len(),
        report.errors.len()
    );
    Ok(report)
}

fn list_pod(pod: &Pod, opts: &ListOptions, report: &mut ListReport) {
    let id = pod.id().to_string();
    let mut fail = |error: Error| {
        report.errors.push(ListError {
            pod: Some(id.clone()),
            error,
        })
    };

    let manifest = if pod.state().has_manifest() {
        match pod.manifest() {
            Ok(manifest) if manifest.apps.is_empty() => {
                fail(Error::NoApps(id.clone()));
                return;
            }
            Ok(manifest) => manifest,
            Err(e) => {
                fail(e);
                return;
            }
        }
    } else {
        PodManifest::default()
    };

    let created = match pod.creation_time() {
        Ok(time) => format_time(time, opts.full),
        Err(e) => {
            fail(e);
            String::new()
        }
    };
    let started = match pod.start_time() {
        Ok(time) => time.map(|t| format_time(t, opts.full)).unwrap_or_default(),
        Err(e) => {
            fail(e);
            String::new()
        }
    };
    let networks = match pod.networks() {
        Ok(nets) => format_networks(&nets),
        Err(e) => {
            fail(e);
            String::new()
        }
    };

    let mut rows = Vec::with_capacity(manifest.apps.len());
    for (i, app) in manifest.apps.iter().enumerate() {
        let image_name = pod.app_image_name(app).unwrap_or_else(|e| {
            fail(e);
            UNKNOWN_IMAGE.to_string()
        });
        let image_id = if opts.full {
            app.image.id.chars().take(IMAGE_ID_LEN).collect()
        } else {
            String::new()
        };
        let mut row = ListRow {
            app: app.name.to_string(),
            image_name,
            image_id,
            ..ListRow::default()
        };
        if i == 0 {
            row.state = pod.state().to_string();
            row.created = created.clone();
            row.started = started.clone();
            row.networks = networks.clone();
        }
        rows.push(row);
    }
    report.rows.extend(rows);
}

/// `name:ip4=addr` per network, comma separated.
pub fn format_networks(nets: &[PodNetwork]) -> String {
    nets.iter()
        .map(PodNetwork::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_time(time: DateTime<Utc>, full: bool) -> String {
    if full {
        time.format(FULL_TIME_FORMAT).to_string()
    } else {
        format_ago(time, Utc::now())
    }
}

/// Relative time such as `3 minutes ago`.
fn format_ago(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(time);
    let plural = |n: i64, unit: &str| format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" });

    if elapsed.num_seconds() < 1 {
        "now".to_string()
    } else if elapsed.num_minutes() < 1 {
        plural(elapsed.num_seconds(), "second")
    } else if elapsed.num_hours() < 1 {
        plural(elapsed.num_minutes(), "minute")
    } else if elapsed.num_days() < 1 {
        plural(elapsed.num_hours(), "hour")
    } else if elapsed.num_days() < 30 {
        plural(elapsed.num_days(), "day")
    } else if elapsed.num_days() < 365 {
        plural(elapsed.num_days() / 30, "month")
    } else {
        plural(elapsed.num_days() / 365, "year")
    }
}

/// Writes the table: one tab-separated line per row, with a header unless
/// suppressed.
pub fn write_report(report: &ListReport, opts: &ListOptions, out: &mut dyn Write) -> io::Result<()> {
    if !opts.no_legend {
        if opts.full {
            writeln!(out, "APP\tIMAGE NAME\tIMAGE ID\tSTATE\tCREATED\tSTARTED\tNETWORKS")?;
        } else {
            writeln!(out, "APP\tIMAGE NAME\tSTATE\tCREATED\tSTARTED\tNETWORKS")?;
        }
    }
    for row in &report.rows {
        if opts.full {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                row.app, row.image_name, row.image_id, row.state, row.created, row.started, row.networks
            )?;
        } else {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}",
                row.app, row.image_name, row.state, row.created, row.started, row.networks
            )?;
        }
    }
    Ok(())
}

/// Writes the per-pod errors as one batch.
pub fn write_errors(errors: &[ListError], out: &mut dyn Write) -> io::Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    writeln!(out, "{} error(s) encountered when listing pods:", errors.len())?;
    writeln!(out, "{}", ERROR_SEPARATOR)?;
    for error in errors {
        writeln!(out, "{}", error)?;
        writeln!(out, "{}", ERROR_SEPARATOR)?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_ago() {
        let now = Utc::now();
        assert_eq!(format_ago(now, now), "now");
        assert_eq!(format_ago(now - Duration::seconds(1), now), "1 second ago");
        assert_eq!(format_ago(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(format_ago(now - Duration::hours(2), now), "2 hours ago");
        assert_eq!(format_ago(now - Duration::days(400), now), "1 year ago");
    }

    #[test]
    fn test_format_networks() {
        let nets = vec![
            PodNetwork {
                name: "default".to_string(),
                ip: "172.16.28.2".to_string(),
            },
            PodNetwork {
                name: "lan".to_string(),
                ip: "10.0.0.5".to_string(),
            },
        ];
        assert_eq!(
            format_networks(&nets),
            "default:ip4=172.16.28.2, lan:ip4=10.0.0.5"
        );
        assert_eq!(format_networks(&[]), "");
    }

    #[test]
    fn test_write_report_without_legend() {
        let report = ListReport {
            rows: vec![ListRow {
                app: "web".to_string(),
                image_name: "example.com/web".to_string(),
                state: "running".to_string(),
                ..ListRow::default()
            }],
            errors: Vec::new(),
        };
        let opts = ListOptions {
            no_legend: true,
            ..ListOptions::default()
        };
        let mut out = Vec::new();
        write_report(&report, &opts, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "web\texample.com/web\trunning\t\t\t\n"
        );
    }
}
