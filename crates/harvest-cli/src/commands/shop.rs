use harvest_core::entities::{NewProduct, ProductPatch, VendorPatch};
use harvest_core::geo::GeoPoint;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::ShopCommands;
use crate::cli::subcommands::shop::{ProductAddArgs, ProductUpdateArgs, ShopUpdateArgs};
use crate::context::AppContext;
use crate::output::output;

#[derive(Serialize)]
struct RemovedResponse<'a> {
    removed: bool,
    product_id: &'a str,
}

/// Handle `harvest shop <subcommand>`.
pub async fn handle(
    action: &ShopCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let market = ctx.marketplace()?;
    match action {
        ShopCommands::Show => output(&market.my_vendor().await?, flags.format),
        ShopCommands::Update(args) => output(
            &market.update_vendor_details(&vendor_patch(args)).await?,
            flags.format,
        ),
        ShopCommands::AddProduct(args) => {
            output(&market.add_product(new_product(args)).await?, flags.format)
        }
        ShopCommands::UpdateProduct(args) => output(
            &market
                .update_product(&args.product_id, &product_patch(args))
                .await?,
            flags.format,
        ),
        ShopCommands::RemoveProduct(args) => {
            market.remove_product(&args.product_id).await?;
            output(
                &RemovedResponse {
                    removed: true,
                    product_id: &args.product_id,
                },
                flags.format,
            )
        }
    }
}

fn vendor_patch(args: &ShopUpdateArgs) -> VendorPatch {
    VendorPatch {
        name: args.name.clone(),
        description: args.description.clone(),
        location: args.lat.zip(args.lng).map(|(lat, lng)| GeoPoint::new(lat, lng)),
        address: args.address.clone(),
        pin_code: args.pin.clone(),
        contact_phone: args.phone.clone(),
        contact_email: args.email.clone(),
        opening_hours: None,
    }
}

fn new_product(args: &ProductAddArgs) -> NewProduct {
    NewProduct {
        name: args.name.clone(),
        description: args.description.clone(),
        price: args.price,
        unit: args.unit.clone(),
        image_url: args.image_url.clone(),
        stock: args.stock,
        category: args.category.clone(),
    }
}

fn product_patch(args: &ProductUpdateArgs) -> ProductPatch {
    ProductPatch {
        name: args.name.clone(),
        description: args.description.clone(),
        price: args.price,
        unit: args.unit.clone(),
        image_url: args.image_url.clone(),
        stock: args.stock,
        category: args.category.clone(),
    }
}
