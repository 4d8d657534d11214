pub mod account;
pub mod enums;
pub mod market;
pub mod orderbook;
pub mod user;

pub use account::{Account, AccountMarginsView, Balance, OpenOrder, PerpPosition, PositionSummary};
pub use enums::{FillMode, Side};
pub use market::{MarketInfo, MarketsInfo, TokenInfo};
pub use orderbook::{OrderbookInfo, SideSummary};
pub use user::{User, UserSession};
