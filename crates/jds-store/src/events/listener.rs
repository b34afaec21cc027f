use jds_core::{Entity, SharedEntity};

use super::{EventArguments, SaveEventArgs};
use crate::errors::Result;

/// Save hooks
///
/// Both hooks run inside the chunk transaction. Statements a hook adds
/// to `args` commit or roll back together with the chunk; an error
/// returned from a hook rolls the chunk back.
pub trait SaveListener {
    /// Before the instance's field writes are batched
    ///
    /// # Errors
    ///
    /// Any error aborts the chunk.
    fn on_pre_save(&self, _args: &mut SaveEventArgs, _entity: &Entity) -> Result<()> {
        Ok(())
    }

    /// After every write of the chunk is batched, before commit
    ///
    /// # Errors
    ///
    /// Any error aborts the chunk.
    fn on_post_save(&self, _args: &mut SaveEventArgs, _entity: &Entity) -> Result<()> {
        Ok(())
    }
}

/// Load hook, called once per top-level instance after it is fully populated
///
/// Statements added to `args` run in one transaction after the page loads.
pub trait LoadListener {
    /// # Errors
    ///
    /// Any error is yielded by the entity stream.
    fn on_post_load(&self, args: &mut EventArguments, entity: &SharedEntity) -> Result<()>;
}
