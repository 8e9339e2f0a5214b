//! A single caller invocation of an offloadable route.

use crate::context::CallerContext;
use crate::key::SubmissionKey;
use crate::poll::PollQuery;

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Start work for `key` (or reuse the job already in flight).
    Submit {
        key: SubmissionKey,
        context: CallerContext,
    },
    /// Ask whether a job is done. `job_id` is kept raw so malformed ids can be
    /// reported as unknown jobs.
    Poll {
        key: SubmissionKey,
        job_id: Option<String>,
    },
}

impl Invocation {
    /// Classify an invocation from its poll query. The snapshot is only built
    /// for submissions.
    pub fn from_query(
        key: SubmissionKey,
        query: PollQuery,
        snapshot: impl FnOnce() -> CallerContext,
    ) -> Self {
        if query.check_status {
            Invocation::Poll {
                key,
                job_id: query.job_id,
            }
        } else {
            Invocation::Submit {
                key,
                context: snapshot(),
            }
        }
    }

    pub fn key(&self) -> &SubmissionKey {
        match self {
            Invocation::Submit { key, .. } | Invocation::Poll { key, .. } => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallerIdentity;
    use crate::id::SessionId;

    fn key() -> SubmissionKey {
        SubmissionKey::new("/report", SessionId::new("42").unwrap()).unwrap()
    }

    #[test]
    fn check_status_selects_poll_without_snapshot() {
        let query = PollQuery {
            check_status: true,
            job_id: Some("abc".to_string()),
        };
        let inv = Invocation::from_query(key(), query, || panic!("snapshot must not be taken"));
        assert!(matches!(inv, Invocation::Poll { job_id: Some(ref id), .. } if id == "abc"));
    }

    #[test]
    fn plain_query_selects_submit() {
        let inv = Invocation::from_query(key(), PollQuery::default(), || {
            CallerContext::new(
                "report",
                "GET",
                "/report",
                CallerIdentity::anonymous(SessionId::new("42").unwrap()),
            )
        });
        assert!(matches!(inv, Invocation::Submit { .. }));
        assert_eq!(inv.key(), &key());
    }
}
