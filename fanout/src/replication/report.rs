use crate::error::{FanoutError, FanoutResult};

/// Progress a sink made during one conductor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkProgress<P> {
    /// Resume position reported by the sink when the run started.
    pub start_position: P,
    /// Position after the last applied batch.
    pub final_position: P,
    pub batches_applied: u64,
    pub records_applied: u64,
}

/// Outcome of one sink's replication loop.
#[derive(Debug, Clone)]
pub struct SinkOutcome<P> {
    pub sink: String,
    pub result: FanoutResult<SinkProgress<P>>,
}

/// Outcome of a conductor run, one entry per sink in configuration order.
///
/// Deciding whether a failed sink is fatal is up to the caller.
#[derive(Debug, Clone)]
pub struct ReplicationReport<P> {
    outcomes: Vec<SinkOutcome<P>>,
}

impl<P> ReplicationReport<P> {
    pub fn new(outcomes: Vec<SinkOutcome<P>>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[SinkOutcome<P>] {
        &self.outcomes
    }

    /// Returns the outcome of the sink called `sink`.
    pub fn outcome(&self, sink: &str) -> Option<&SinkOutcome<P>> {
        self.outcomes.iter().find(|outcome| outcome.sink == sink)
    }

    /// Returns `true` if every sink converged.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }

    /// Returns the sinks that converged along with their progress.
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &SinkProgress<P>)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(progress) => Some((outcome.sink.as_str(), progress)),
            Err(_) => None,
        })
    }

    /// Returns the sinks that failed along with their error.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &FanoutError)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(_) => None,
            Err(err) => Some((outcome.sink.as_str(), err)),
        })
    }

    /// Returns the progress of every sink, or every sink failure aggregated into one error.
    pub fn into_result(self) -> FanoutResult<Vec<(String, SinkProgress<P>)>> {
        let mut progress = Vec::with_capacity(self.outcomes.len());
        let mut errors = Vec::new();

        for outcome in self.outcomes {
            match outcome.result {
                Ok(sink_progress) => progress.push((outcome.sink, sink_progress)),
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            Ok(progress)
        } else {
            Err(errors.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fanout_error;

    fn progress(final_position: i64) -> SinkProgress<i64> {
        SinkProgress {
            start_position: 0,
            final_position,
            batches_applied: 1,
            records_applied: final_position as u64,
        }
    }

    #[test]
    fn failed_sink_makes_report_unsuccessful() {
        let report = ReplicationReport::new(vec![
            SinkOutcome {
                sink: "warehouse".to_string(),
                result: Ok(progress(10)),
            },
            SinkOutcome {
                sink: "graph".to_string(),
                result: Err(fanout_error!(ErrorKind::ConnectivityError, "Sink unreachable")),
            },
        ]);

        assert!(!report.is_success());
        assert_eq!(report.succeeded().map(|(sink, _)| sink).collect::<Vec<_>>(), vec!["warehouse"]);
        assert_eq!(report.failed().map(|(sink, _)| sink).collect::<Vec<_>>(), vec!["graph"]);
        assert_eq!(
            report.into_result().unwrap_err().kind(),
            ErrorKind::ConnectivityError
        );
    }

    #[test]
    fn successful_report_yields_progress() {
        let report = ReplicationReport::new(vec![SinkOutcome {
            sink: "warehouse".to_string(),
            result: Ok(progress(10)),
        }]);

        assert!(report.is_success());
        assert_eq!(report.outcome("warehouse").unwrap().sink, "warehouse");
        assert_eq!(
            report.into_result().unwrap(),
            vec![("warehouse".to_string(), progress(10))]
        );
    }
}
