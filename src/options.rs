use bon::Builder;

/// How a user-supplied rule's transitions are extended to both orderings of
/// a pair (spec §4.1 "Symmetric mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionOrder {
    /// The rule is taken exactly as given; `(i, j)` and `(j, i)` may differ.
    Asymmetric,
    /// Only `(i, j)` with `i <= j` need be given; `(j, i)` is filled in by
    /// swapping the outputs of `(i, j)`.
    #[default]
    Symmetric,
    /// The rule must already define both `(i, j)` and `(j, i)`; building the
    /// table asserts they agree instead of filling one in from the other.
    Both,
}

/// Tuning and policy knobs for a [`crate::driver::SimulationDriver`].
///
/// Everything here has a documented default (spec §9's two previously-open
/// questions), so `SimulationOptions::builder().build()` is always valid.
#[derive(Debug, Clone, Builder)]
pub struct SimulationOptions {
    /// How the preprocessor extends a partially-specified rule to both pair
    /// orderings.
    #[builder(default)]
    pub transition_order: TransitionOrder,

    /// Seed for the driver's RNG stream. `None` draws a fresh seed from the
    /// OS at construction time (spec §9 "Per-simulation RNG streams").
    pub seed: Option<u64>,

    /// EWMA null-interaction fraction above which the driver switches from
    /// `MultiBatchEngine` to `GillespieEngine` (spec §4.4.6).
    #[builder(default = 0.95)]
    pub gillespie_switch_threshold: f64,

    /// Decay rate of the null-fraction EWMA, spec §4.4.6 default 0.1.
    #[builder(default = 0.1)]
    pub null_fraction_decay: f64,

    /// `alpha` of spec §4.4.2: batch size is `floor(alpha * sqrt(n))`.
    #[builder(default = 1.0)]
    pub batch_alpha: f64,

    /// `beta` of spec §4.4.2: the collision-budget multiplier used only to
    /// size internal scratch buffers, not to bound correctness.
    #[builder(default = 1.0)]
    pub batch_beta: f64,

    /// Upper bound on `|Q|` during `ReachabilityBuilder` exploration (spec §9).
    #[builder(default = 65536)]
    pub max_states: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        SimulationOptions::builder().seed(None).build()
    }
}
