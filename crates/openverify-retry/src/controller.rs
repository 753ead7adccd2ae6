use crate::config::RetryPolicy;
use crate::opaque::OpaqueData;
use crate::outcome::{OpenMode, OpenOutcome};
use openverify_cache::{make_cache_key, Verdict, VerifyCache};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Opaque-blob field under which already-rejected targets are reported
/// back to the storage layer, comma-joined, so it stops redirecting us to
/// servers this request has given up on.
const TRIED_FIELD: &str = "tried";

/// One attempt to open a resource on the storage layer.
///
/// May block for an arbitrary duration; the controller imposes no timeout.
/// Result codes beyond the four [`OpenOutcome`] classes are the
/// implementation's business and pass through uninterpreted.
pub trait RemoteOpen {
    fn open_once(
        &self,
        path: &str,
        mode: OpenMode,
        token: Option<&str>,
        opaque: &OpaqueData,
    ) -> OpenOutcome;
}

/// Lightweight content-reachability check against a redirect target,
/// addressed by its canonical cache key (`host[:port]//path`).
///
/// Typically opens the resource and reads its boundary bytes. Transport
/// errors fold into `false`; the controller caches the boolean, it does
/// not distinguish failure causes.
pub trait TargetProbe {
    fn probe(&self, key: &str, token: Option<&str>, opaque: &OpaqueData) -> bool;
}

// The controller takes opener and prober as separate values; these let one
// shared implementation instance play both roles.
impl<T: RemoteOpen + ?Sized> RemoteOpen for Arc<T> {
    fn open_once(
        &self,
        path: &str,
        mode: OpenMode,
        token: Option<&str>,
        opaque: &OpaqueData,
    ) -> OpenOutcome {
        (**self).open_once(path, mode, token, opaque)
    }
}

impl<T: TargetProbe + ?Sized> TargetProbe for Arc<T> {
    fn probe(&self, key: &str, token: Option<&str>, opaque: &OpaqueData) -> bool {
        (**self).probe(key, token, opaque)
    }
}

/// Drives one open request through a chain of server redirects.
///
/// Per redirect, the target is checked against the shared [`VerifyCache`]
/// before the expensive probe runs; probe results are written back with
/// the asymmetric TTLs from [`RetryPolicy`]. Targets rejected within this
/// request accumulate in a tried list that rides along in the opaque blob
/// of every subsequent attempt, and the negative cache entry guarantees no
/// target is probed twice in one request.
///
/// Targets are tried strictly in the order redirects arrive; nothing is
/// parallelized across candidates.
pub struct RetryController<O, P> {
    cache: Arc<VerifyCache>,
    policy: RetryPolicy,
    opener: O,
    prober: P,
}

impl<O: RemoteOpen, P: TargetProbe> RetryController<O, P> {
    pub fn new(cache: Arc<VerifyCache>, policy: RetryPolicy, opener: O, prober: P) -> Self {
        Self {
            cache,
            policy,
            opener,
            prober,
        }
    }

    pub fn cache(&self) -> &Arc<VerifyCache> {
        &self.cache
    }

    /// Run one open request to completion.
    ///
    /// Write-intent opens bypass verification entirely: one underlying
    /// attempt, returned verbatim. Read-intent opens loop over redirects
    /// up to `max_open_attempts`; if the bound is exhausted while still
    /// being redirected, the last redirect is returned as a best-effort
    /// result rather than a synthesized failure.
    pub fn run(
        &self,
        path: &str,
        mode: OpenMode,
        token: Option<&str>,
        opaque: &OpaqueData,
    ) -> OpenOutcome {
        if mode.bypasses_verification() {
            tracing::debug!(path, ?mode, "write-intent open, verification bypassed");
            return self.opener.open_once(path, mode, token, opaque);
        }

        let mut tried: Vec<String> = Vec::new();
        let mut attempts = 0u32;

        loop {
            let aux = with_tried(opaque, &tried);

            match self.opener.open_once(path, mode, token, &aux) {
                OpenOutcome::Stall(secs) => {
                    // A stall repeats the identical attempt: it consumes no
                    // attempt slot and leaves the tried list untouched.
                    let wait = Duration::from_secs(u64::from(secs)).min(self.policy.max_stall);
                    tracing::debug!(path, wait_secs = wait.as_secs(), "server stalled the open");
                    std::thread::sleep(wait);
                }
                OpenOutcome::Redirect(target) => {
                    attempts += 1;
                    let key = make_cache_key(path, &target.host, target.port);

                    match self.cache.get(&key, Instant::now()) {
                        Some(Verdict::Positive) => {
                            tracing::debug!(key = %key, "target verified (cached), accepting redirect");
                            return OpenOutcome::Redirect(target);
                        }
                        Some(Verdict::Negative) => {
                            tracing::warn!(key = %key, "target rejected (cached)");
                            tried.push(target.to_string());
                        }
                        None => {
                            tracing::debug!(key = %key, "verification cache miss, probing");
                            if self.prober.probe(&key, token, &aux) {
                                self.cache.put_positive(
                                    &key,
                                    self.policy.positive_ttl,
                                    Instant::now(),
                                );
                                tracing::debug!(key = %key, "probe succeeded, accepting redirect");
                                return OpenOutcome::Redirect(target);
                            }
                            self.cache.put_negative(
                                &key,
                                self.policy.negative_ttl,
                                Instant::now(),
                            );
                            tracing::warn!(key = %key, "probe failed");
                            tried.push(target.to_string());
                        }
                    }

                    if attempts >= self.policy.max_open_attempts {
                        // Best effort: hand back the last-seen outcome
                        // rather than inventing a failure code.
                        tracing::warn!(
                            path,
                            attempts,
                            "open attempts exhausted while redirecting"
                        );
                        return OpenOutcome::Redirect(target);
                    }
                }
                terminal => return terminal,
            }
        }
    }
}

/// Clone the caller's blob and merge the accumulated tried list into it.
fn with_tried(opaque: &OpaqueData, tried: &[String]) -> OpaqueData {
    let mut aux = opaque.clone();
    aux.append_list(TRIED_FIELD, tried);
    aux
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::RedirectTarget;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::collections::VecDeque;

    fn redirect(host: &str, port: u16) -> OpenOutcome {
        OpenOutcome::Redirect(RedirectTarget::new(host, Some(port)))
    }

    /// Opener that replays a fixed script and records the opaque blob of
    /// every attempt.
    struct ScriptedOpen {
        script: Mutex<VecDeque<OpenOutcome>>,
        seen_opaque: Mutex<Vec<String>>,
    }

    impl ScriptedOpen {
        fn new(script: Vec<OpenOutcome>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen_opaque: Mutex::new(Vec::new()),
            }
        }
    }

    impl RemoteOpen for ScriptedOpen {
        fn open_once(
            &self,
            _path: &str,
            _mode: OpenMode,
            _token: Option<&str>,
            opaque: &OpaqueData,
        ) -> OpenOutcome {
            self.seen_opaque.lock().push(opaque.to_query());
            self.script.lock().pop_front().expect("open script exhausted")
        }
    }

    /// Probe that succeeds only for keys whose `host:port` token is listed
    /// as good, and records every call.
    struct ScriptedProbe {
        good_hosts: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProbe {
        fn new(good_hosts: &[&str]) -> Self {
            Self {
                good_hosts: good_hosts.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl TargetProbe for ScriptedProbe {
        fn probe(&self, key: &str, _token: Option<&str>, _opaque: &OpaqueData) -> bool {
            self.calls.lock().push(key.to_string());
            let host = key.split("//").next().unwrap_or("");
            self.good_hosts.contains(host)
        }
    }

    fn controller(
        script: Vec<OpenOutcome>,
        good_hosts: &[&str],
        max_attempts: u32,
    ) -> RetryController<ScriptedOpen, ScriptedProbe> {
        let policy = RetryPolicy {
            max_open_attempts: max_attempts,
            ..RetryPolicy::default()
        };
        RetryController::new(
            Arc::new(VerifyCache::new()),
            policy,
            ScriptedOpen::new(script),
            ScriptedProbe::new(good_hosts),
        )
    }

    #[test]
    fn success_passes_through() {
        let c = controller(vec![OpenOutcome::Ok], &[], 3);
        assert_eq!(c.run("/f", OpenMode::READ, None, &OpaqueData::new()), OpenOutcome::Ok);
        assert!(c.prober.calls().is_empty());
    }

    #[test]
    fn failure_passes_through_unretried() {
        let c = controller(vec![OpenOutcome::Failed(-11)], &[], 3);
        assert_eq!(
            c.run("/f", OpenMode::READ, None, &OpaqueData::new()),
            OpenOutcome::Failed(-11)
        );
        assert_eq!(c.opener.seen_opaque.lock().len(), 1);
    }

    #[test]
    fn verified_redirect_is_accepted() {
        let c = controller(vec![redirect("a", 1094)], &["a:1094"], 3);
        assert_eq!(
            c.run("/f", OpenMode::READ, None, &OpaqueData::new()),
            redirect("a", 1094)
        );
        assert_eq!(c.prober.calls(), vec!["a:1094//f"]);
        // The probe result landed in the cache.
        assert_eq!(
            c.cache().get("a:1094//f", Instant::now()),
            Some(Verdict::Positive)
        );
    }

    #[test]
    fn dedup_scenario_failed_then_healthy_target() {
        // Redirects: A (probe fails), A again, then B (probe succeeds).
        let c = controller(
            vec![redirect("a", 1), redirect("a", 1), redirect("b", 1)],
            &["b:1"],
            5,
        );
        let out = c.run("/data/f", OpenMode::READ, None, &OpaqueData::new());

        assert_eq!(out, redirect("b", 1));
        // A was probed exactly once despite redirecting twice; B once.
        assert_eq!(c.prober.calls(), vec!["a:1//data/f", "b:1//data/f"]);

        let now = Instant::now();
        assert_eq!(c.cache().get("a:1//data/f", now), Some(Verdict::Negative));
        assert_eq!(c.cache().get("b:1//data/f", now), Some(Verdict::Positive));
    }

    #[test]
    fn tried_list_accumulates_across_attempts() {
        let c = controller(
            vec![redirect("a", 1), redirect("b", 2), redirect("c", 3)],
            &["c:3"],
            5,
        );
        c.run("/f", OpenMode::READ, None, &OpaqueData::new());

        let seen = c.opener.seen_opaque.lock().clone();
        assert_eq!(seen, vec!["", "tried=a:1", "tried=a:1,b:2"]);
    }

    #[test]
    fn tried_list_merges_into_existing_field() {
        let c = controller(vec![redirect("a", 1), OpenOutcome::Ok], &[], 5);
        let opaque = OpaqueData::parse("tried=x&auth=1");
        c.run("/f", OpenMode::READ, None, &opaque);

        let seen = c.opener.seen_opaque.lock().clone();
        assert_eq!(seen, vec!["tried=x&auth=1", "tried=x,a:1&auth=1"]);
    }

    #[test]
    fn cached_positive_short_circuits_probe() {
        let c = controller(vec![redirect("a", 1)], &[], 3);
        c.cache()
            .put_positive("a:1//f", Duration::from_secs(60), Instant::now());

        assert_eq!(
            c.run("/f", OpenMode::READ, None, &OpaqueData::new()),
            redirect("a", 1)
        );
        assert!(c.prober.calls().is_empty());
    }

    #[test]
    fn cached_negative_skips_probe_and_retries() {
        let c = controller(vec![redirect("a", 1), OpenOutcome::Ok], &[], 3);
        c.cache()
            .put_negative("a:1//f", Duration::from_secs(60), Instant::now());

        assert_eq!(
            c.run("/f", OpenMode::READ, None, &OpaqueData::new()),
            OpenOutcome::Ok
        );
        assert!(c.prober.calls().is_empty());
        assert_eq!(
            c.opener.seen_opaque.lock().clone(),
            vec!["", "tried=a:1"]
        );
    }

    #[test]
    fn exhaustion_returns_last_redirect() {
        let c = controller(
            vec![redirect("a", 1), redirect("b", 2), redirect("c", 3)],
            &[],
            3,
        );
        let out = c.run("/f", OpenMode::READ, None, &OpaqueData::new());

        // All probes failed; the bound is hit and the last redirect is
        // returned as-is, not a synthesized error.
        assert_eq!(out, redirect("c", 3));
        assert_eq!(c.prober.calls().len(), 3);
    }

    #[test]
    fn stall_does_not_consume_an_attempt() {
        // max_open_attempts = 1, but two zero-second stalls precede the
        // terminal outcome: stalls must not count against the bound.
        let c = controller(
            vec![
                OpenOutcome::Stall(0),
                OpenOutcome::Stall(0),
                OpenOutcome::Ok,
            ],
            &[],
            1,
        );
        assert_eq!(
            c.run("/f", OpenMode::READ, None, &OpaqueData::new()),
            OpenOutcome::Ok
        );
    }

    #[test]
    fn bypass_never_probes() {
        let c = controller(vec![redirect("a", 1)], &["a:1"], 3);
        // Pre-seed a negative entry to show the cache is not even consulted.
        c.cache()
            .put_negative("a:1//f", Duration::from_secs(60), Instant::now());

        let out = c.run("/f", OpenMode::WRITE | OpenMode::CREATE, None, &OpaqueData::new());
        assert_eq!(out, redirect("a", 1));
        assert!(c.prober.calls().is_empty());
        // The single underlying attempt saw the caller's blob untouched.
        assert_eq!(c.opener.seen_opaque.lock().clone(), vec![""]);
    }

    #[test]
    fn port_distinguishes_targets() {
        let c = controller(vec![redirect("a", 1), redirect("a", 2)], &["a:2"], 5);
        let out = c.run("/f", OpenMode::READ, None, &OpaqueData::new());

        assert_eq!(out, redirect("a", 2));
        assert_eq!(c.prober.calls(), vec!["a:1//f", "a:2//f"]);
    }
}
