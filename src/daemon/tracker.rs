use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::debug;

use crate::{daemon::storage::session::Session, window_api::UrlProbe};

/// One poll-tick observation of the foreground state. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct Sample {
    pub window: Option<Arc<str>>,
    pub program: Option<Arc<str>>,
    pub timestamp: DateTime<Local>,
}

/// The session that is currently accumulating time.
struct OpenSession {
    window: Arc<str>,
    program: Arc<str>,
    started: DateTime<Local>,
}

/// Converts the stream of samples into discrete completed sessions.
///
/// Identity is the window *title*: two programs sharing a title are merged into one session, and
/// a title change within one program (a browser tab switch, say) starts a new session even though
/// the program did not change. Unset samples are probe misses, not user actions, and leave the
/// open session untouched. Nothing is retained beyond the single open session.
pub struct SessionTracker {
    url_probe: Box<dyn UrlProbe>,
    open: Option<OpenSession>,
}

impl SessionTracker {
    pub fn new(url_probe: Box<dyn UrlProbe>) -> Self {
        Self {
            url_probe,
            open: None,
        }
    }

    /// Feeds one sample through the state machine. Returns the completed session when this
    /// sample closed one.
    ///
    /// The very first observed window never produces a record by itself, and a run whose
    /// duration comes out at zero seconds is silently dropped, so that unreliable zero-length
    /// entries never reach the record store.
    pub fn observe(&mut self, sample: &Sample) -> Option<Session> {
        let (Some(window), Some(program)) = (sample.window.as_ref(), sample.program.as_ref())
        else {
            debug!("Probe miss, keeping the open session as is");
            return None;
        };

        match self.open.as_mut() {
            None => {
                self.open = Some(OpenSession {
                    window: window.clone(),
                    program: program.clone(),
                    started: sample.timestamp,
                });
                None
            }
            Some(open) if open.window == *window => None,
            Some(open) => {
                let stopped = sample.timestamp;
                let finished = if (stopped - open.started).num_seconds() > 0 {
                    // The url lookup is expensive, it only runs here, once per close, and only
                    // for the program that owned the closing session.
                    let (url, domain) = self.url_probe.current(&open.program);
                    Some(Session {
                        window: open.window.clone(),
                        program: open.program.clone(),
                        url,
                        domain,
                        started: open.started,
                        stopped,
                    })
                } else {
                    debug!("Dropping zero-length run of {}", open.window);
                    None
                };
                if finished.is_some() {
                    open.started = stopped;
                }
                open.window = window.clone();
                open.program = program.clone();
                finished
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Local, TimeZone};
    use mockall::predicate::eq;

    use crate::window_api::MockUrlProbe;

    use super::{Sample, SessionTracker};

    fn ts(seconds: i64) -> DateTime<Local> {
        Local.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn sample(window: &str, program: &str, seconds: i64) -> Sample {
        Sample {
            window: Some(window.into()),
            program: Some(program.into()),
            timestamp: ts(seconds),
        }
    }

    fn unset_sample(seconds: i64) -> Sample {
        Sample {
            window: None,
            program: None,
            timestamp: ts(seconds),
        }
    }

    fn tracker_without_urls() -> SessionTracker {
        let mut url_probe = MockUrlProbe::new();
        url_probe.expect_current().returning(|_| (None, None));
        SessionTracker::new(Box::new(url_probe))
    }

    #[test]
    fn test_transition_emits_previous_session() {
        let mut tracker = tracker_without_urls();

        assert!(tracker.observe(&sample("first", "p1", 0)).is_none());
        assert!(tracker.observe(&sample("first", "p1", 5)).is_none());
        let session = tracker.observe(&sample("second", "p2", 5)).unwrap();
        assert!(tracker.observe(&sample("second", "p2", 9)).is_none());

        assert_eq!(session.window.as_ref(), "first");
        assert_eq!(session.program.as_ref(), "p1");
        assert_eq!(session.started, ts(0));
        assert_eq!(session.stopped, ts(5));
        assert_eq!(session.duration_seconds(), 5);
        // The second window stays open and is lost if the daemon stops here.
    }

    #[test]
    fn test_probe_miss_never_closes_a_session() {
        let mut tracker = tracker_without_urls();

        assert!(tracker.observe(&sample("first", "p1", 0)).is_none());
        assert!(tracker.observe(&unset_sample(3)).is_none());
        assert!(tracker.observe(&sample("first", "p1", 6)).is_none());
    }

    #[test]
    fn test_probe_miss_before_first_window_stays_idle() {
        let mut tracker = tracker_without_urls();

        assert!(tracker.observe(&unset_sample(0)).is_none());
        assert!(tracker.observe(&sample("first", "p1", 1)).is_none());
        let session = tracker.observe(&sample("second", "p2", 4)).unwrap();
        assert_eq!(session.started, ts(1));
    }

    #[test]
    fn test_zero_duration_runs_are_dropped() {
        let mut tracker = tracker_without_urls();

        assert!(tracker.observe(&sample("first", "p1", 0)).is_none());
        // Two switches within the same second, the first run never accumulated time.
        assert!(tracker.observe(&sample("second", "p2", 0)).is_none());
        assert!(tracker.observe(&sample("second", "p2", 4)).is_none());

        let session = tracker.observe(&sample("third", "p3", 4)).unwrap();
        assert_eq!(session.window.as_ref(), "second");
        assert_eq!(session.duration_seconds(), 4);
    }

    #[test]
    fn test_emitted_sessions_match_maximal_runs() {
        let mut tracker = tracker_without_urls();
        let samples = [
            sample("a", "p", 0),
            sample("a", "p", 1),
            sample("b", "p", 2),
            sample("b", "p", 2),
            sample("c", "p", 5),
            sample("c", "p", 6),
            sample("a", "p", 7),
        ];

        let sessions: Vec<_> = samples
            .iter()
            .filter_map(|s| tracker.observe(s))
            .collect();

        // Four maximal runs [a, b, c, a], minus the still-open trailing run.
        assert_eq!(sessions.len(), 3);
        assert_eq!(
            sessions
                .iter()
                .map(|s| s.window.as_ref())
                .collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_shared_title_is_one_session() {
        let mut tracker = tracker_without_urls();

        // Two programs with an identical title merge into a single session, title equality is
        // the only transition signal.
        assert!(tracker.observe(&sample("shared", "p1", 0)).is_none());
        assert!(tracker.observe(&sample("shared", "p2", 3)).is_none());
        let session = tracker.observe(&sample("other", "p3", 6)).unwrap();
        assert_eq!(session.duration_seconds(), 6);
    }

    #[test]
    fn test_url_probe_queried_with_closing_program() {
        let mut url_probe = MockUrlProbe::new();
        url_probe
            .expect_current()
            .with(eq("Google Chrome"))
            .times(1)
            .returning(|_| {
                (
                    Some("https://youtube.com/watch".into()),
                    Some("youtube.com".into()),
                )
            });
        let mut tracker = SessionTracker::new(Box::new(url_probe));

        assert!(tracker
            .observe(&sample("Vibing in YouTube", "Google Chrome", 0))
            .is_none());
        let session = tracker.observe(&sample("Document 1", "Word", 5)).unwrap();

        assert_eq!(session.url.as_deref(), Some("https://youtube.com/watch"));
        assert_eq!(session.domain.as_deref(), Some("youtube.com"));
    }
}
