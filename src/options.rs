/// Default bound on the length of any path produced during evaluation.
pub const DEFAULT_MAX_DEPTH: usize = 2_000;

/// Default bound on the size of any intermediate working set.
pub const DEFAULT_MAX_RESULTS: usize = 1_000_000;

/// Resource limits applied while evaluating a compiled path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    pub max_depth: usize,
    pub max_results: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl EvalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}
