//! Ordered fallback over equivalent send actions.
//!
//! Each candidate gets its own window to become actionable. The first one that
//! does is triggered after a short settle pause; a candidate that never becomes
//! actionable (or fails to trigger) hands over to the next. Nothing is rolled
//! back between attempts.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// How to find an element on the messaging surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    XPath(String),
    Css(String),
}

impl Locator {
    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::XPath(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Locator::Css(value.into())
    }

    /// W3C WebDriver location strategy name.
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::XPath(_) => "xpath",
            Locator::Css(_) => "css selector",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Locator::XPath(v) | Locator::Css(v) => v,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// Timing applied to every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatePolicy {
    /// Maximum wait for a single candidate to become actionable.
    pub per_candidate_timeout: Duration,
    /// Delay between actionability probes.
    pub poll_interval: Duration,
    /// Pause between a candidate becoming actionable and triggering it.
    pub settle_delay: Duration,
}

impl Default for CandidatePolicy {
    fn default() -> Self {
        Self {
            per_candidate_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Something candidates can be located on and triggered against.
#[async_trait]
pub trait ActionSurface: Send {
    type Target: Send;

    /// Probe once. `Ok(None)` when the candidate is absent or not yet actionable.
    async fn locate_actionable(
        &mut self,
        locator: &Locator,
    ) -> anyhow::Result<Option<Self::Target>>;

    async fn trigger(&mut self, target: Self::Target) -> anyhow::Result<()>;
}

/// Try `candidates` in order; returns the index of the one that was triggered.
pub async fn run_candidates<S>(
    surface: &mut S,
    candidates: &[Locator],
    policy: &CandidatePolicy,
) -> Option<usize>
where
    S: ActionSurface + ?Sized,
{
    for (index, locator) in candidates.iter().enumerate() {
        let Some(target) = wait_actionable(surface, locator, policy).await else {
            tracing::debug!(candidate = %locator, "Candidate not actionable in time");
            continue;
        };

        tokio::time::sleep(policy.settle_delay).await;

        match surface.trigger(target).await {
            Ok(()) => {
                tracing::debug!(candidate = %locator, index, "Candidate triggered");
                return Some(index);
            }
            Err(e) => {
                tracing::warn!(candidate = %locator, error = %e, "Candidate failed to trigger");
            }
        }
    }

    None
}

async fn wait_actionable<S>(
    surface: &mut S,
    locator: &Locator,
    policy: &CandidatePolicy,
) -> Option<S::Target>
where
    S: ActionSurface + ?Sized,
{
    let deadline = Instant::now() + policy.per_candidate_timeout;

    loop {
        match surface.locate_actionable(locator).await {
            Ok(Some(target)) => return Some(target),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(candidate = %locator, error = %e, "Probe failed");
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep(policy.poll_interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Surface where each locator becomes actionable after a number of probes.
    #[derive(Default)]
    struct FakeSurface {
        /// `None` = never actionable.
        ready_after: HashMap<String, Option<u32>>,
        broken_trigger: Vec<String>,
        probes: HashMap<String, u32>,
        triggered: Vec<String>,
    }

    impl FakeSurface {
        fn ready(mut self, value: &str, after: u32) -> Self {
            self.ready_after.insert(value.to_string(), Some(after));
            self
        }

        fn never(mut self, value: &str) -> Self {
            self.ready_after.insert(value.to_string(), None);
            self
        }
    }

    #[async_trait]
    impl ActionSurface for FakeSurface {
        type Target = String;

        async fn locate_actionable(
            &mut self,
            locator: &Locator,
        ) -> anyhow::Result<Option<String>> {
            let key = locator.value().to_string();
            let count = self.probes.entry(key.clone()).or_default();
            *count += 1;
            match self.ready_after.get(&key) {
                Some(Some(after)) if *count > *after => Ok(Some(key)),
                Some(_) => Ok(None),
                None => anyhow::bail!("no such element"),
            }
        }

        async fn trigger(&mut self, target: String) -> anyhow::Result<()> {
            if self.broken_trigger.contains(&target) {
                anyhow::bail!("element click intercepted");
            }
            self.triggered.push(target);
            Ok(())
        }
    }

    fn policy() -> CandidatePolicy {
        CandidatePolicy {
            per_candidate_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_candidate_wins() {
        let mut surface = FakeSurface::default().ready("a", 0).ready("b", 0);
        let candidates = [Locator::xpath("a"), Locator::xpath("b")];

        let winner = run_candidates(&mut surface, &candidates, &policy()).await;

        assert_eq!(winner, Some(0));
        assert_eq!(surface.triggered, vec!["a"]);
        assert!(!surface.probes.contains_key("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_through_after_timeout() {
        let mut surface = FakeSurface::default().never("a").ready("b", 2);
        let candidates = [Locator::xpath("a"), Locator::css("b")];
        let started = Instant::now();

        let winner = run_candidates(&mut surface, &candidates, &policy()).await;

        assert_eq!(winner, Some(1));
        assert_eq!(surface.triggered, vec!["b"]);
        // 10s window on "a", two 1s polls on "b", 2s settle
        assert_eq!(started.elapsed(), Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_errors_count_as_not_actionable() {
        let mut surface = FakeSurface::default().ready("b", 0);
        let candidates = [Locator::xpath("missing"), Locator::xpath("b")];

        let winner = run_candidates(&mut surface, &candidates, &policy()).await;

        assert_eq!(winner, Some(1));
        assert_eq!(surface.probes["missing"], 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_failure_moves_on() {
        let mut surface = FakeSurface::default().ready("a", 0).ready("b", 0);
        surface.broken_trigger.push("a".to_string());
        let candidates = [Locator::xpath("a"), Locator::xpath("b")];

        let winner = run_candidates(&mut surface, &candidates, &policy()).await;

        assert_eq!(winner, Some(1));
        assert_eq!(surface.triggered, vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_none() {
        let mut surface = FakeSurface::default().never("a").never("b");
        let candidates = [Locator::xpath("a"), Locator::xpath("b")];

        let winner = run_candidates(&mut surface, &candidates, &policy()).await;

        assert_eq!(winner, None);
        assert!(surface.triggered.is_empty());
    }

    #[test]
    fn test_locator_strategy_names() {
        assert_eq!(Locator::xpath("//a").strategy(), "xpath");
        assert_eq!(Locator::css("#pane-side").strategy(), "css selector");
        assert_eq!(Locator::css("#pane-side").to_string(), "css selector=#pane-side");
    }
}
