//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Discriminants come from the state-machine constants in `syncbridge-core`
//! and match the seed data of the corresponding `*_statuses` table.

use syncbridge_core::bulk::status as bulk;
use syncbridge_core::scheduling::state_machine as sync;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Lower-case name as seeded in the lookup table.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }

            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Sync job lifecycle status.
    SyncJobStatus {
        Pending = sync::PENDING => "pending",
        Queued = sync::QUEUED => "queued",
        Running = sync::RUNNING => "running",
        Completed = sync::COMPLETED => "completed",
        Failed = sync::FAILED => "failed",
        Cancelled = sync::CANCELLED => "cancelled",
    }
}

define_status_enum! {
    /// Bulk operation lifecycle status.
    BulkOperationStatus {
        Pending = bulk::PENDING => "pending",
        Processing = bulk::PROCESSING => "processing",
        Completed = bulk::COMPLETED => "completed",
        Partial = bulk::PARTIAL => "partial",
        Failed = bulk::FAILED => "failed",
        Cancelled = bulk::CANCELLED => "cancelled",
        RolledBack = bulk::ROLLED_BACK => "rolled_back",
    }
}

impl SyncJobStatus {
    pub fn is_terminal(self) -> bool {
        sync::is_terminal(self.id())
    }
}
