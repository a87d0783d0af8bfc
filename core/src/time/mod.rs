//! Calendar arithmetic, epochs and time zones

pub mod calendar;
pub mod epoch;
pub mod sync;
pub mod transitions;
pub mod zone;
pub mod zonedb;
pub mod zoned;

pub use calendar::{CivilDate, CivilDateTime};
pub use epoch::{current_epoch_year, set_current_epoch_year, Epoch, EpochSeconds, UnixSeconds};
pub use sync::{wait_for_valid_time, TimeShift};
pub use zone::ZoneInfo;
pub use zonedb::find_zone;
pub use zoned::ZonedDateTime;
