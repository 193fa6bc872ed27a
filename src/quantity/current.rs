quantity!(Amperes, "A");

impl Amperes {
    /// Clamp into the inclusive `[min, max]` range.
    #[must_use]
    pub fn clamp(self, min: Self, max: Self) -> Self {
        self.max(min).min(max)
    }
}
