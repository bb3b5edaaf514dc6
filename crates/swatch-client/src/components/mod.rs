mod debug_hud;
mod swatch_stripe;

pub use debug_hud::DebugHud;
pub use swatch_stripe::SwatchStripe;
