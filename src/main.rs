//! Aliphoria CLI

use std::{
    io::{self, Write},
    process::ExitCode,
    sync::Arc,
};

use aliphoria::{
    auth::{AuthError, AuthSession, CredentialDirectory},
    cart::{CartState, CartStore},
    catalog::{Catalog, CatalogError},
    checkout::{CheckoutError, CheckoutSummary, ShippingPolicy},
    config::{Config, ConfigError},
    observability::{self, ObservabilityError},
    products::Product,
    storage::Storage,
    wishlist::WishlistStore,
};
use clap::{Args, Parser, Subcommand};
use rusty_money::Money;
use tabled::{builder::Builder, settings::Style};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "aliphoria", about = "Aliphoria storefront CLI", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List catalog products
    Products(ProductsArgs),

    /// Inspect or change the cart
    #[command(subcommand)]
    Cart(CartCommand),

    /// Inspect or change the wishlist
    #[command(subcommand)]
    Wishlist(WishlistCommand),

    /// Sign in with a mock account
    Login(LoginArgs),

    /// Create a shopper account and sign in
    Register(RegisterArgs),

    /// Sign out
    Logout,

    /// Show who is signed in
    Whoami,

    /// Show the order summary for the cart
    Checkout,
}

#[derive(Debug, Args)]
struct ProductsArgs {
    /// Only products in this category
    #[arg(long)]
    category: Option<String>,

    /// Only featured products
    #[arg(long)]
    featured: bool,

    /// Only trending products
    #[arg(long)]
    trending: bool,
}

#[derive(Debug, Args)]
struct VariantArgs {
    /// Product id
    product_id: String,

    /// Size; defaults to the first size the product offers
    #[arg(long)]
    size: Option<String>,

    /// Colour name; defaults to the first colour the product offers
    #[arg(long)]
    color: Option<String>,
}

#[derive(Debug, Subcommand)]
enum CartCommand {
    /// Show cart lines and totals
    Show,

    /// Add units of a product variant
    Add {
        #[command(flatten)]
        variant: VariantArgs,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },

    /// Remove a product variant
    Remove {
        #[command(flatten)]
        variant: VariantArgs,
    },

    /// Set the quantity of a product variant; zero or less removes it
    Update {
        #[command(flatten)]
        variant: VariantArgs,

        /// New quantity
        #[arg(short, long, allow_negative_numbers = true)]
        quantity: i64,
    },

    /// Remove every line
    Clear,
}

#[derive(Debug, Subcommand)]
enum WishlistCommand {
    /// Show saved products
    Show,

    /// Save a product
    Add {
        /// Product id
        product_id: String,
    },

    /// Forget a product
    Remove {
        /// Product id
        product_id: String,
    },

    /// Forget every product
    Clear,
}

#[derive(Debug, Args)]
struct LoginArgs {
    /// Account email
    #[arg(long)]
    email: String,

    /// Account password
    #[arg(long, env = "ALIPHORIA_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Debug, Args)]
struct RegisterArgs {
    /// Display name
    #[arg(long)]
    name: String,

    /// Account email
    #[arg(long)]
    email: String,

    /// Account password
    #[arg(long, env = "ALIPHORIA_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Observability(#[from] ObservabilityError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("unknown product: {0}")]
    UnknownProduct(String),

    #[error("product {product} is not offered in {option} {value}")]
    UnknownVariant {
        product: String,
        option: &'static str,
        value: String,
    },

    #[error("sign in before checking out")]
    NotSignedIn,

    #[error("your cart is empty")]
    EmptyCart,
}

fn main() -> ExitCode {
    _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            _ = error.print();
            return if error.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(error) = observability::init_logging(&cli.config.logging) {
        _ = writeln!(io::stderr(), "{error}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            _ = writeln!(io::stderr(), "error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = cli.config;
    let storage = config.storage()?;
    let policy = config.shipping_policy()?;
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Products(args) => {
            let catalog = Catalog::load(&config.catalog)?;
            let products = catalog
                .iter()
                .filter(|product| {
                    args.category
                        .as_deref()
                        .is_none_or(|category| product.category.eq_ignore_ascii_case(category))
                })
                .filter(|product| !args.featured || product.featured)
                .filter(|product| !args.trending || product.trending);

            write_products(&mut out, products, &policy)?;
        }
        Commands::Cart(command) => run_cart(&mut out, command, storage, &config, &policy)?,
        Commands::Wishlist(command) => run_wishlist(&mut out, command, storage, &config, &policy)?,
        Commands::Login(args) => {
            let mut session = open_session(storage, &config)?;
            let user = session.login(&args.email, &args.password)?;

            writeln!(out, "Signed in as {} <{}>", user.name, user.email)?;
        }
        Commands::Register(args) => {
            let mut session = open_session(storage, &config)?;
            let user = session.register(&args.name, &args.email, &args.password)?;

            writeln!(out, "Welcome, {}! You are signed in.", user.name)?;
        }
        Commands::Logout => {
            open_session(storage, &config)?.logout();

            writeln!(out, "Signed out")?;
        }
        Commands::Whoami => match open_session(storage, &config)?.user() {
            Some(user) => writeln!(out, "{} <{}> ({:?})", user.name, user.email, user.role)?,
            None => writeln!(out, "Not signed in")?,
        },
        Commands::Checkout => {
            let session = open_session(Arc::clone(&storage), &config)?;
            let user = session.user().ok_or(AppError::NotSignedIn)?;
            let cart = CartStore::open(storage).snapshot();

            if cart.is_empty() {
                return Err(AppError::EmptyCart);
            }

            writeln!(out, "Order for {} <{}>", user.name, user.email)?;

            CheckoutSummary::from_cart(&cart, &policy).write_to(&mut out, &cart)?;
        }
    }

    Ok(())
}

fn run_cart(
    out: &mut impl Write,
    command: CartCommand,
    storage: Arc<dyn Storage>,
    config: &Config,
    policy: &ShippingPolicy,
) -> Result<(), AppError> {
    let mut cart = CartStore::open(storage);

    let state = match command {
        CartCommand::Show => cart.snapshot(),
        CartCommand::Add { variant, quantity } => {
            let catalog = Catalog::load(&config.catalog)?;
            let (product, size, color) = resolve_variant(&catalog, variant)?;

            cart.add(product, quantity, size, color)
        }
        CartCommand::Remove { variant } => {
            let (product_id, size, color) = line_variant(&cart, variant);

            cart.remove(product_id, size, color)
        }
        CartCommand::Update { variant, quantity } => {
            let (product_id, size, color) = line_variant(&cart, variant);

            cart.update_quantity(product_id, size, color, quantity)
        }
        CartCommand::Clear => cart.clear(),
    };

    write_cart(out, &state, policy)
}

fn run_wishlist(
    out: &mut impl Write,
    command: WishlistCommand,
    storage: Arc<dyn Storage>,
    config: &Config,
    policy: &ShippingPolicy,
) -> Result<(), AppError> {
    let mut wishlist = WishlistStore::open(storage);

    let state = match command {
        WishlistCommand::Show => wishlist.snapshot(),
        WishlistCommand::Add { product_id } => {
            let catalog = Catalog::load(&config.catalog)?;
            let product = catalog
                .product(&product_id)
                .cloned()
                .ok_or(AppError::UnknownProduct(product_id))?;

            wishlist.add(product)
        }
        WishlistCommand::Remove { product_id } => wishlist.remove(product_id),
        WishlistCommand::Clear => wishlist.clear(),
    };

    if state.is_empty() {
        writeln!(out, "Your wishlist is empty")?;
        return Ok(());
    }

    write_products(out, state.products().iter(), policy)
}

fn open_session(storage: Arc<dyn Storage>, config: &Config) -> Result<AuthSession, AppError> {
    let directory = CredentialDirectory::load(&config.accounts)?;

    Ok(AuthSession::open(storage, directory))
}

/// Find the product and settle the size and colour, defaulting to the first
/// offered option the way quick-add does.
fn resolve_variant(
    catalog: &Catalog,
    variant: VariantArgs,
) -> Result<(Product, String, String), AppError> {
    let product = catalog
        .product(&variant.product_id)
        .cloned()
        .ok_or_else(|| AppError::UnknownProduct(variant.product_id.clone()))?;

    let size = match variant.size {
        Some(size) if !product.sizes.is_empty() && !product.offers_size(&size) => {
            return Err(AppError::UnknownVariant {
                product: variant.product_id,
                option: "size",
                value: size,
            });
        }
        Some(size) => size,
        None => product.sizes.first().cloned().unwrap_or_default(),
    };

    let color = match variant.color {
        Some(color) if !product.colors.is_empty() && !product.offers_color(&color) => {
            return Err(AppError::UnknownVariant {
                product: variant.product_id,
                option: "color",
                value: color,
            });
        }
        Some(color) => color,
        None => product
            .colors
            .first()
            .map(|color| color.name.clone())
            .unwrap_or_default(),
    };

    Ok((product, size, color))
}

/// Settle the size and colour of an existing line. When either is omitted and
/// the product has exactly one line in the cart, that line's variant is used.
fn line_variant(cart: &CartStore, variant: VariantArgs) -> (String, String, String) {
    let snapshot = cart.snapshot();
    let mut lines = snapshot
        .items()
        .iter()
        .filter(|line| line.product.id.as_str() == variant.product_id)
        .filter(|line| variant.size.as_ref().is_none_or(|size| line.size == *size))
        .filter(|line| variant.color.as_ref().is_none_or(|color| line.color == *color));

    match (lines.next(), lines.next()) {
        (Some(line), None) => (variant.product_id, line.size.clone(), line.color.clone()),
        _ => (
            variant.product_id,
            variant.size.unwrap_or_default(),
            variant.color.unwrap_or_default(),
        ),
    }
}

fn write_products<'a>(
    out: &mut impl Write,
    products: impl Iterator<Item = &'a Product>,
    policy: &ShippingPolicy,
) -> Result<(), AppError> {
    let mut builder = Builder::default();

    builder.push_record(["Id", "Name", "Category", "Price", "Sizes", "Colors"]);

    for product in products {
        let price = Money::from_decimal(product.effective_price(), policy.currency);
        let price = if product.is_discounted() {
            format!(
                "{price} (was {})",
                Money::from_decimal(product.price, policy.currency)
            )
        } else {
            price.to_string()
        };

        builder.push_record([
            product.id.to_string(),
            product.name.clone(),
            product.category.clone(),
            price,
            product.sizes.join(" "),
            product
                .colors
                .iter()
                .map(|color| color.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ]);
    }

    let mut table = builder.build();
    table.with(Style::modern_rounded());

    writeln!(out, "{table}")?;

    Ok(())
}

fn write_cart(
    out: &mut impl Write,
    cart: &CartState,
    policy: &ShippingPolicy,
) -> Result<(), AppError> {
    if cart.is_empty() {
        writeln!(out, "Your cart is empty")?;
        return Ok(());
    }

    CheckoutSummary::from_cart(cart, policy).write_to(out, cart)?;

    Ok(())
}
