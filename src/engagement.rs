/// Like state for one video as seen by the current viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Engagement {
    pub liked: bool,
    pub like_count: u64,
    pub shares: u64,
    in_flight: usize,
    // Values before the oldest unresolved toggle.
    baseline: Option<Snapshot>,
}

/// Pre-toggle values restored when the mutating request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    liked: bool,
    like_count: u64,
}

impl Engagement {
    pub fn new(like_count: u64, shares: u64) -> Self {
        Self {
            liked: false,
            like_count,
            shares,
            in_flight: 0,
            baseline: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight > 0
    }

    /// Flips `liked` and moves the count by one, returning what to revert to.
    pub fn apply_toggle(&mut self) -> Snapshot {
        let snapshot = Snapshot {
            liked: self.liked,
            like_count: self.like_count,
        };
        self.liked = !self.liked;
        self.like_count = if self.liked {
            self.like_count.saturating_add(1)
        } else {
            self.like_count.saturating_sub(1)
        };
        if self.in_flight == 0 {
            self.baseline = Some(snapshot);
        }
        self.in_flight += 1;
        snapshot
    }

    pub fn confirm(&mut self, liked: bool, likes: u64) {
        self.liked = liked;
        self.like_count = likes;
        self.settle_one();
        if let Some(baseline) = self.baseline.as_mut() {
            *baseline = Snapshot {
                liked,
                like_count: likes,
            };
        }
    }

    pub fn revert(&mut self, snapshot: Snapshot) {
        self.liked = snapshot.liked;
        self.like_count = snapshot.like_count;
        self.settle_one();
    }

    fn settle_one(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight == 0 {
            self.baseline = None;
        }
    }

    /// Server-derived like status; ignored while a toggle is unresolved.
    pub fn observe_status(&mut self, liked: bool) {
        if !self.is_pending() {
            self.liked = liked;
        }
    }

    /// Drops viewer-specific state when the signed-in identity changes.
    /// Unresolved toggles will never be applied, so their count change is undone.
    pub fn reset_viewer(&mut self) {
        if let Some(baseline) = self.baseline.take() {
            self.like_count = baseline.like_count;
        }
        self.liked = false;
        self.in_flight = 0;
    }

    pub fn record_share(&mut self) {
        self.shares = self.shares.saturating_add(1);
    }
}
