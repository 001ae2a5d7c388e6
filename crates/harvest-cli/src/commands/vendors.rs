use harvest_core::entities::NewVendor;
use harvest_core::geo::GeoPoint;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::VendorCommands;
use crate::cli::subcommands::vendors::VendorApplyArgs;
use crate::context::AppContext;
use crate::output::{notices, output};

/// Handle `harvest vendors <subcommand>`.
pub async fn handle(
    action: &VendorCommands,
    ctx: &mut AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let market = ctx.marketplace()?;
    match action {
        VendorCommands::List => output(&market.directory(flags.limit).await?, flags.format),
        VendorCommands::Search(args) => {
            output(&market.search(&args.query, flags.limit).await?, flags.format)
        }
        VendorCommands::Near(args) => {
            let mut nearby = market
                .near(GeoPoint::new(args.lat, args.lng), args.radius)
                .await?;
            if let Some(limit) = flags.limit {
                nearby.truncate(limit as usize);
            }
            output(&nearby, flags.format)
        }
        VendorCommands::Apply(args) => {
            let result = market.apply(application(args)).await;
            notices(&ctx.take_events(), flags);
            output(&result?, flags.format)
        }
        VendorCommands::Mine => output(&market.my_applications().await?, flags.format),
    }
}

fn application(args: &VendorApplyArgs) -> NewVendor {
    NewVendor {
        name: args.name.clone(),
        description: args.description.clone(),
        location: args.lat.zip(args.lng).map(|(lat, lng)| GeoPoint::new(lat, lng)),
        address: Some(args.address.clone()),
        pin_code: Some(args.pin.clone()),
        contact_phone: args.phone.clone(),
        contact_email: args.email.clone(),
        id_proof_url: None,
    }
}
