//! Local, in-process CLI for poking at an [`Engine`] without a server:
//! add an order, cancel one, or print the book. Kept close to the
//! teacher's `src/cli.rs`, retargeted at the new `Engine`/`Price` types.

use clap::{Parser, Subcommand, builder::PossibleValuesParser};

use crate::{
    engine::{Engine, EngineConfig},
    orderbook::Level,
    orders::{Order, OrderType, Side},
    price::Price,
};

#[derive(Parser)]
#[command(name = "lob-engine")]
#[command(version, about = "A price-time-priority limit order book engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new order to the book
    Add {
        #[arg(value_parser = PossibleValuesParser::new(["buy", "sell"]))]
        side: String,
        #[arg(value_parser = PossibleValuesParser::new(["limit", "market"]))]
        order_type: String,
        /// Price (only used for limit orders)
        price: Option<String>,
        /// Quantity (must be > 0)
        quantity: u64,
    },
    /// Cancel a resting order by id
    Cancel { id: u64 },
    /// Print the current order book
    Book,
}

fn handle_add(engine: &mut Engine, next_id: &mut u64, side: &str, order_type: &str, price: Option<String>, quantity: u64) {
    let side = match side {
        "buy" => Side::Buy,
        "sell" => Side::Sell,
        _ => unreachable!(),
    };
    let order_type = match order_type {
        "limit" => OrderType::Limit,
        "market" => OrderType::Market,
        _ => unreachable!(),
    };
    let price = price.map(|p| p.parse::<Price>().expect("invalid price literal"));

    let id = *next_id;
    *next_id += 1;
    let order = Order {
        id,
        side,
        order_type,
        price: match order_type {
            OrderType::Limit => price,
            OrderType::Market => None,
        },
        quantity,
        ts_ns: 0,
    };

    match engine.add_order(order) {
        Ok((_, fills)) if fills.is_empty() => println!("order {id} resting, no fills"),
        Ok((_, fills)) => {
            println!("order {id} produced {} fill(s):", fills.len());
            for t in fills {
                println!("  {:?}", t);
            }
        }
        Err(e) => println!("order {id} rejected: {e}"),
    }
}

fn print_level(label: &str, levels: &[Level]) {
    println!("{label}:");
    for (price, qty) in levels {
        println!("  price {price}, qty {qty}");
    }
}

pub fn run_cli() {
    let cli = Cli::parse();
    let mut engine = Engine::new(EngineConfig::default());
    let mut next_id: u64 = 1;

    match cli.command {
        Commands::Add { side, order_type, price, quantity } => {
            handle_add(&mut engine, &mut next_id, &side, &order_type, price, quantity);
            print_level("Bids", &engine.snapshot(Side::Buy));
            print_level("Asks", &engine.snapshot(Side::Sell));
        }
        Commands::Cancel { id } => {
            engine.cancel_order(id);
            println!("cancel requested for order {id}");
        }
        Commands::Book => {
            print_level("Bids", &engine.snapshot(Side::Buy));
            print_level("Asks", &engine.snapshot(Side::Sell));
        }
    }
}
