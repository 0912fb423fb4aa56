// Custom types that are widely used are defined here.

// Database ID types.
pub type CompetitorId = u32;
pub type CompetitionId = u32;
pub type ActionId = u32;
pub type EmailId = u32;
pub type OfferId = u32;
pub type PlayerId = u32;

// 1-based position of a competitor in the list given to a scheduler.
pub type Seed = usize;

// Home score first, away score second.
pub type Score = [u32; 2];

// Type conversions.
pub mod convert {
    // Convert usize to f64.
    pub fn usize_to_f64(num: usize) -> f64 {
        // Competitor counts never get anywhere near the precision limit.
        num as f64
    }

    // Floor of a non-negative float as usize.
    pub fn floor_to_usize(num: f64) -> usize {
        if num.is_nan() || num <= 0.0 {
            return 0;
        }
        return num.floor() as usize;
    }
}
