//! Social Module
//!
//! Data structures for the social graph and the counters derived from it:
//!
//! - `EdgeState` - One side's view of a relationship
//! - `NotificationKind` - Notifications created by graph transitions
//! - `UnreadCounts` - Aggregate returned on reconnect

pub mod notification;
pub mod relationship;
pub mod unread;

pub use notification::{NewNotification, NotificationKind};
pub use relationship::{
    EdgeState, FriendRequestResponse, ListFriendsResponse, RelationshipChange,
    RelationshipResponse, RequestOutcome,
};
pub use unread::UnreadCounts;
