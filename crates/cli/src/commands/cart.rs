//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! sc-cli show
//! sc-cli add 10 --price 19.99 --name "Dried Pineapple"
//! sc-cli set-qty 42 3
//! sc-cli toggle p:10
//! sc-cli drop 42 43
//! ```

use storecart_core::{Price, ProductId};
use storecart_sync::{CartError, CartSnapshot, IdentityGate, LineKey, ProductSummary};

use super::Context;

/// Print the cart.
///
/// # Errors
///
/// Returns an error if the cart cannot be serialized.
#[allow(clippy::print_stdout)]
pub fn show(ctx: &Context, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(ctx.engine.snapshot())?);
        return Ok(());
    }
    print_cart(ctx.engine.snapshot());
    match ctx.session.authenticated_since() {
        Some(since) if ctx.session.is_authenticated() => {
            let role = ctx
                .session
                .role()
                .map_or_else(String::new, |role| format!(" as {role}"));
            println!("(signed in{role} since {})", since.format("%Y-%m-%d %H:%M UTC"));
        }
        _ => println!("(signed out)"),
    }
    Ok(())
}

/// Refresh the cart from its authoritative source.
pub async fn reload(ctx: &mut Context) -> Result<(), CartError> {
    ctx.engine.reload().await?;
    print_cart(ctx.engine.snapshot());
    Ok(())
}

/// Add one unit of a product.
pub async fn add(
    ctx: &mut Context,
    product: ProductId,
    price: Price,
    name: Option<String>,
    image: Option<String>,
) -> Result<(), CartError> {
    let mut summary = ProductSummary::new(product, price);
    summary.name = name;
    summary.image = image;
    ctx.engine.add(&summary).await?;
    print_cart(ctx.engine.snapshot());
    Ok(())
}

/// Set a line's quantity.
pub async fn set_quantity(ctx: &mut Context, line: LineKey, quantity: i64) -> Result<(), CartError> {
    ctx.engine.set_quantity(line, quantity).await?;
    print_cart(ctx.engine.snapshot());
    Ok(())
}

/// Flip a line's selection.
pub async fn toggle(ctx: &mut Context, line: LineKey) -> Result<(), CartError> {
    ctx.engine.toggle_selection(line).await?;
    print_cart(ctx.engine.snapshot());
    Ok(())
}

/// Remove one line.
pub async fn remove(ctx: &mut Context, line: LineKey) -> Result<(), CartError> {
    ctx.engine.remove_line(line).await?;
    print_cart(ctx.engine.snapshot());
    Ok(())
}

/// Remove every line.
pub async fn clear(ctx: &mut Context) -> Result<(), CartError> {
    ctx.engine.clear().await?;
    print_cart(ctx.engine.snapshot());
    Ok(())
}

/// Select or deselect every line.
pub async fn select_all(ctx: &mut Context, selected: bool) -> Result<(), CartError> {
    ctx.engine.select_all(selected).await?;
    print_cart(ctx.engine.snapshot());
    Ok(())
}

/// Drop lines locally.
#[allow(clippy::print_stdout)]
pub fn drop_lines(ctx: &mut Context, lines: &[LineKey]) {
    let removed = ctx.engine.bulk_remove(lines);
    println!("Dropped {removed} line(s)");
    print_cart(ctx.engine.snapshot());
}

#[allow(clippy::print_stdout)]
fn print_cart(snapshot: &CartSnapshot) {
    if snapshot.is_empty() {
        println!("Cart is empty");
        return;
    }

    for line in snapshot {
        let mark = if line.selected { "[x]" } else { "[ ]" };
        println!(
            "{mark} {:<8} {:<32} {:>4} x {:>10} = {:>10}",
            line.key().to_string(),
            line.name.as_deref().unwrap_or("(unnamed)"),
            line.quantity,
            line.price.map_or_else(|| "-".to_string(), |price| price.to_string()),
            line.line_total().to_string(),
        );
    }
    println!(
        "{} item(s), total {}, selected {}",
        snapshot.total_items(),
        snapshot.total_price(),
        snapshot.selected_total()
    );
}
