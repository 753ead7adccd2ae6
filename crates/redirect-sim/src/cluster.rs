use openverify_retry::{
    OpaqueData, OpenMode, OpenOutcome, RedirectTarget, RemoteOpen, TargetProbe,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// In-process stand-in for a redirecting storage cluster.
///
/// The head node never serves reads itself: every read open is redirected
/// to a data node, rotating round-robin but skipping nodes the request has
/// already reported in its `tried` field. Write-intent opens are accepted
/// locally. Probes fail for nodes in the broken set.
pub struct SimCluster {
    data_nodes: Vec<RedirectTarget>,
    broken: HashSet<String>,
    next: AtomicUsize,
    opens: AtomicU64,
    probes: AtomicU64,
}

impl SimCluster {
    pub fn new(data_nodes: Vec<RedirectTarget>, broken: HashSet<String>) -> Self {
        Self {
            data_nodes,
            broken,
            next: AtomicUsize::new(0),
            opens: AtomicU64::new(0),
            probes: AtomicU64::new(0),
        }
    }

    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }

    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    /// Next data node not present in the request's tried list.
    fn pick_target(&self, tried: &HashSet<&str>) -> Option<RedirectTarget> {
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        (0..self.data_nodes.len())
            .map(|i| &self.data_nodes[(start + i) % self.data_nodes.len()])
            .find(|t| !tried.contains(t.to_string().as_str()))
            .cloned()
    }
}

impl RemoteOpen for SimCluster {
    fn open_once(
        &self,
        _path: &str,
        mode: OpenMode,
        _token: Option<&str>,
        opaque: &OpaqueData,
    ) -> OpenOutcome {
        self.opens.fetch_add(1, Ordering::Relaxed);

        if mode.bypasses_verification() {
            return OpenOutcome::Ok;
        }

        let tried: HashSet<&str> = opaque
            .get("tried")
            .map(|v| v.split(',').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        match self.pick_target(&tried) {
            Some(target) => OpenOutcome::Redirect(target),
            // Every data node has been tried and rejected.
            None => OpenOutcome::Failed(-3011),
        }
    }
}

impl TargetProbe for SimCluster {
    fn probe(&self, key: &str, _token: Option<&str>, _opaque: &OpaqueData) -> bool {
        self.probes.fetch_add(1, Ordering::Relaxed);
        let host_port = key.split("//").next().unwrap_or("");
        !self.broken.contains(host_port)
    }
}
