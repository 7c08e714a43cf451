//! Session commands.
//!
//! # Usage
//!
//! ```bash
//! sc-cli login --token "$TOKEN" --role customer
//! sc-cli logout
//! ```

use storecart_core::UserRole;
use storecart_sync::CartError;

use super::Context;

/// Start a session and adopt the server cart.
#[allow(clippy::print_stdout)]
pub async fn login(ctx: &mut Context, token: String, role: Option<UserRole>) -> Result<(), CartError> {
    ctx.session.login(token, role);
    ctx.engine.on_login().await?;
    println!(
        "Signed in, {} line(s) in cart",
        ctx.engine.snapshot().len()
    );
    Ok(())
}

/// End the session and empty the local cart.
#[allow(clippy::print_stdout)]
pub fn logout(ctx: &mut Context) {
    ctx.session.logout();
    ctx.engine.on_logout();
    println!("Signed out");
}
