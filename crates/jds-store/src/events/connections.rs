use std::collections::BTreeMap;

use jds_core::errors::{JdsError, JdsErrorKind};

use crate::connection::{ConnectionProvider, ConnectionSlot, SqlConnection};
use crate::dialect::DialectKind;
use crate::errors::Result;

/// The default connection plus lazily opened auxiliary connections
///
/// Auxiliary connections are opened through the provider on first use
/// and kept for the rest of the operation.
pub struct Connections<'c> {
    default: &'c mut dyn SqlConnection,
    provider: Option<&'c dyn ConnectionProvider>,
    aux: BTreeMap<u32, Box<dyn SqlConnection>>,
}

impl<'c> Connections<'c> {
    pub fn new(default: &'c mut dyn SqlConnection) -> Self {
        Self {
            default,
            provider: None,
            aux: BTreeMap::new(),
        }
    }

    pub fn with_provider(
        default: &'c mut dyn SqlConnection,
        provider: &'c dyn ConnectionProvider,
    ) -> Self {
        Self {
            default,
            provider: Some(provider),
            aux: BTreeMap::new(),
        }
    }

    pub fn default_dialect(&self) -> DialectKind {
        self.default.dialect()
    }

    pub fn default_mut(&mut self) -> &mut dyn SqlConnection {
        &mut *self.default
    }

    /// # Errors
    ///
    /// `Config` when an auxiliary slot is used without a provider, or
    /// whatever the provider returns when opening fails.
    pub fn get(&mut self, slot: ConnectionSlot) -> Result<&mut dyn SqlConnection> {
        let id = match slot {
            ConnectionSlot::Default => return Ok(&mut *self.default),
            ConnectionSlot::Aux(id) => id,
        };
        if !self.aux.contains_key(&id) {
            let provider = self.provider.ok_or_else(|| {
                JdsError::new(JdsErrorKind::Config)
                    .with_op("open_connection")
                    .with_message(format!("No connection provider for slot {}", id))
            })?;
            let conn = provider.open(id)?;
            self.aux.insert(id, conn);
        }
        match self.aux.get_mut(&id) {
            Some(boxed) => {
                let conn: &mut dyn SqlConnection = boxed.as_mut();
                Ok(conn)
            }
            None => Err(JdsError::new(JdsErrorKind::Internal)
                .with_op("open_connection")
                .with_message(format!("Connection slot {} vanished", id))),
        }
    }
}
