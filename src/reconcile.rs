use std::collections::BTreeMap;
use std::time::Duration;

use crate::{core::Rgba8, ease::Ease};

/// Interpolatable visual attributes of one keyed shape.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Attrs {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: Rgba8,
    pub opacity: f64,
}

impl Attrs {
    pub fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        fn mix(a: f64, b: f64, t: f64) -> f64 {
            a + (b - a) * t
        }

        Self {
            x: mix(a.x, b.x, t),
            y: mix(a.y, b.y, t),
            width: mix(a.width, b.width, t),
            height: mix(a.height, b.height, t),
            color: Rgba8::lerp(a.color, b.color, t),
            opacity: mix(a.opacity, b.opacity, t),
        }
    }

    /// The "zero" state anchored at these attrs: no extent, fully
    /// transparent. Enters grow out of it, exits shrink into it, so shapes
    /// never pop in from nowhere.
    pub fn collapsed(&self) -> Self {
        Self {
            width: 0.0,
            opacity: 0.0,
            ..*self
        }
    }
}

/// Which reconciliation bucket a transition belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    Enter,
    Update,
    Exit,
}

/// Durations and easing per phase. Exits are deliberately shorter than
/// enters/updates so departing shapes clear the view without blocking new
/// arrivals.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransitionTiming {
    pub enter: Duration,
    pub update: Duration,
    pub exit: Duration,
    pub enter_ease: Ease,
    pub update_ease: Ease,
    pub exit_ease: Ease,
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            enter: Duration::from_millis(800),
            update: Duration::from_millis(800),
            exit: Duration::from_millis(400),
            enter_ease: Ease::OutCubic,
            update_ease: Ease::OutCubic,
            exit_ease: Ease::InCubic,
        }
    }
}

/// One in-flight interpolation for a stable key.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Transition {
    pub key: String,
    pub phase: Phase,
    pub from: Attrs,
    pub to: Attrs,
    pub duration: Duration,
    pub ease: Ease,
}

impl Transition {
    /// Attributes at `elapsed` since the plan started.
    pub fn sample(&self, elapsed: Duration) -> Attrs {
        if self.duration.is_zero() {
            return self.to;
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        Attrs::lerp(&self.from, &self.to, self.ease.apply(t))
    }

    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }
}

/// Last-known attributes per key; the persistent half of a view's render
/// state between frames.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct VisualSet(BTreeMap<String, Attrs>);

impl VisualSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Attrs> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, attrs: Attrs) {
        self.0.insert(key.into(), attrs);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attrs)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The enter/update/exit partition produced by one reconcile pass.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct TransitionPlan {
    pub transitions: Vec<Transition>,
}

/// Reconcile the previous visual set against new layout targets.
///
/// Keying is the load-bearing correctness property: a key present on both
/// sides means "this entity moved" and interpolates, a key on one side only
/// means a genuine arrival or departure. Targets must be keyed by stable
/// entity identity, never by list position.
pub fn reconcile(
    prev: &VisualSet,
    targets: &[(String, Attrs)],
    timing: &TransitionTiming,
) -> TransitionPlan {
    let mut transitions = Vec::with_capacity(targets.len());

    for (key, target) in targets {
        match prev.get(key) {
            Some(current) => transitions.push(Transition {
                key: key.clone(),
                phase: Phase::Update,
                from: *current,
                to: *target,
                duration: timing.update,
                ease: timing.update_ease,
            }),
            None => transitions.push(Transition {
                key: key.clone(),
                phase: Phase::Enter,
                from: target.collapsed(),
                to: *target,
                duration: timing.enter,
                ease: timing.enter_ease,
            }),
        }
    }

    for (key, current) in prev.iter() {
        if targets.iter().any(|(k, _)| k == key) {
            continue;
        }
        transitions.push(Transition {
            key: key.to_string(),
            phase: Phase::Exit,
            from: *current,
            to: current.collapsed(),
            duration: timing.exit,
            ease: timing.exit_ease,
        });
    }

    TransitionPlan { transitions }
}

impl TransitionPlan {
    pub fn phase_count(&self, phase: Phase) -> usize {
        self.transitions.iter().filter(|t| t.phase == phase).count()
    }

    /// Drawable attrs at `elapsed`; finished exits have left the view.
    pub fn sample(&self, elapsed: Duration) -> Vec<(&str, Attrs)> {
        self.transitions
            .iter()
            .filter(|t| !(t.phase == Phase::Exit && t.is_done(elapsed)))
            .map(|t| (t.key.as_str(), t.sample(elapsed)))
            .collect()
    }

    /// The visual set once every transition has finished: exactly the
    /// targets, exits removed. Feed this back as `prev` for the next frame.
    pub fn settled(&self) -> VisualSet {
        let mut set = VisualSet::new();
        for t in &self.transitions {
            if t.phase != Phase::Exit {
                set.insert(t.key.clone(), t.to);
            }
        }
        set
    }

    /// Mid-flight snapshot used to retarget when a new frame supersedes this
    /// plan: the next reconcile starts from these sampled attrs, so two
    /// plans never animate the same element against each other.
    pub fn visual_at(&self, elapsed: Duration) -> VisualSet {
        let mut set = VisualSet::new();
        for (key, attrs) in self.sample(elapsed) {
            set.insert(key, attrs);
        }
        set
    }

    pub fn is_complete(&self, elapsed: Duration) -> bool {
        self.transitions.iter().all(|t| t.is_done(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(x: f64, width: f64) -> Attrs {
        Attrs {
            x,
            y: 10.0,
            width,
            height: 20.0,
            color: Rgba8::rgb(200, 40, 40),
            opacity: 1.0,
        }
    }

    fn targets(list: &[(&str, f64)]) -> Vec<(String, Attrs)> {
        list.iter()
            .map(|(k, w)| (k.to_string(), attrs(0.0, *w)))
            .collect()
    }

    #[test]
    fn partitions_by_key_membership() {
        let timing = TransitionTiming::default();
        let first = reconcile(&VisualSet::new(), &targets(&[("a", 50.0), ("b", 80.0)]), &timing);
        assert_eq!(first.phase_count(Phase::Enter), 2);

        let prev = first.settled();
        let second = reconcile(&prev, &targets(&[("b", 90.0), ("c", 10.0)]), &timing);
        assert_eq!(second.phase_count(Phase::Update), 1);
        assert_eq!(second.phase_count(Phase::Enter), 1);
        assert_eq!(second.phase_count(Phase::Exit), 1);
        let exit = second
            .transitions
            .iter()
            .find(|t| t.phase == Phase::Exit)
            .unwrap();
        assert_eq!(exit.key, "a");
        assert_eq!(exit.to.width, 0.0);
        assert_eq!(exit.to.opacity, 0.0);
    }

    #[test]
    fn enters_grow_from_the_zero_state() {
        let timing = TransitionTiming::default();
        let plan = reconcile(&VisualSet::new(), &targets(&[("a", 50.0)]), &timing);
        let t0 = plan.sample(Duration::ZERO);
        assert_eq!(t0[0].1.width, 0.0);
        assert_eq!(t0[0].1.opacity, 0.0);
        let done = plan.sample(timing.enter);
        assert_eq!(done[0].1.width, 50.0);
        assert_eq!(done[0].1.opacity, 1.0);
    }

    #[test]
    fn reconcile_is_idempotent_against_its_settled_state() {
        let timing = TransitionTiming::default();
        let goal = targets(&[("a", 50.0), ("b", 80.0)]);
        let plan = reconcile(&VisualSet::new(), &goal, &timing);
        let again = reconcile(&plan.settled(), &goal, &timing);
        assert_eq!(again.phase_count(Phase::Enter), 0);
        assert_eq!(again.phase_count(Phase::Exit), 0);
        assert_eq!(again.phase_count(Phase::Update), 2);
        assert!(again.transitions.iter().all(|t| t.from == t.to));
    }

    #[test]
    fn finished_exits_leave_the_sample() {
        let timing = TransitionTiming::default();
        let prev = reconcile(&VisualSet::new(), &targets(&[("a", 50.0)]), &timing).settled();
        let plan = reconcile(&prev, &[], &timing);
        assert_eq!(plan.sample(Duration::from_millis(100)).len(), 1);
        assert!(plan.sample(timing.exit).is_empty());
        assert!(plan.settled().is_empty());
    }

    #[test]
    fn exit_is_shorter_than_update_by_default() {
        let timing = TransitionTiming::default();
        assert!(timing.exit < timing.update);
        assert!(timing.exit < timing.enter);
    }

    #[test]
    fn retarget_starts_from_the_sampled_midpoint() {
        let timing = TransitionTiming {
            update_ease: Ease::Linear,
            enter_ease: Ease::Linear,
            ..TransitionTiming::default()
        };
        let prev = reconcile(&VisualSet::new(), &targets(&[("a", 0.0)]), &timing).settled();
        let plan = reconcile(&prev, &targets(&[("a", 100.0)]), &timing);

        // A control change lands halfway through the 800ms update.
        let midway = plan.visual_at(Duration::from_millis(400));
        assert_eq!(midway.get("a").unwrap().width, 50.0);

        let retargeted = reconcile(&midway, &targets(&[("a", 10.0)]), &timing);
        let update = &retargeted.transitions[0];
        assert_eq!(update.phase, Phase::Update);
        assert_eq!(update.from.width, 50.0);
        assert_eq!(update.to.width, 10.0);
    }
}
