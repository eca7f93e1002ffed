use clap::{Arg, ArgAction, Command};
use std::io::{self, Write};

const PRODUCT_HEADER: &[&str] = &[
    "Product Name",
    "Product Id",
    "Product SKU",
    "Product Type",
    "Category Id",
    "Main Product Id",
    "Can Be Purchased",
    "Weight",
    "Priority",
];

const REVIEW_HEADER: &[&str] = &[
    "Product Name",
    "Product SKU",
    "Product Id",
    "Description Type",
    "Language",
    "Description Content",
];

fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .about("Generate a synthetic catalog CSV on stdout")
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(
            Arg::new("data-type")
                .long("data-type")
                .value_parser(["PhysicalProduct", "EditorialReview"])
                .default_value("PhysicalProduct"),
        )
        .arg(
            Arg::new("bad-every")
                .long("bad-every")
                .help("Damage every Nth row (0 = never)")
                .value_parser(clap::value_parser!(u64))
                .default_value("0"),
        )
        .arg(
            Arg::new("no-header")
                .long("no-header")
                .action(ArgAction::SetTrue),
        )
        .arg(Arg::new("delim").long("delim").default_value(";"))
        .get_matches();

    let rows = matches.get_one::<u64>("rows").copied().unwrap_or_default();
    let bad_every = matches.get_one::<u64>("bad-every").copied().unwrap_or_default();
    let reviews = matches
        .get_one::<String>("data-type")
        .is_some_and(|t| t == "EditorialReview");
    let delim = matches
        .get_one::<String>("delim")
        .map(String::as_str)
        .unwrap_or(";");

    let mut out = io::BufWriter::new(io::stdout().lock());

    if !matches.get_flag("no-header") {
        let header = if reviews { REVIEW_HEADER } else { PRODUCT_HEADER };
        write!(&mut out, "{}\r\n", header.join(delim))?;
    }

    for i in 0..rows {
        let damaged = bad_every > 0 && (i + 1) % bad_every == 0;
        let row = if reviews {
            review_row(i, damaged)
        } else {
            product_row(i, damaged)
        };
        write!(&mut out, "{}\r\n", row.join(delim))?;
        if i % 10_000 == 0 {
            out.flush()?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Damage cycles through the decode failure kinds.
fn product_row(i: u64, damaged: bool) -> Vec<String> {
    let mut row = vec![
        format!("Product {i}"),
        format!("p{i:08}"),
        format!("SKU{i:010}"),
        "Physical".to_string(),
        format!("cat{}", i % 17),
        String::new(),
        if i % 2 == 0 { "true" } else { "false" }.to_string(),
        format!("{}.5", i % 40),
        (i % 10).to_string(),
    ];
    if damaged {
        match i % 4 {
            0 => row[0] = format!("\"Product {i}"),
            1 => row.truncate(4),
            2 => row[2].clear(),
            _ => row[7] = "heavy".to_string(),
        }
    }
    row
}

fn review_row(i: u64, damaged: bool) -> Vec<String> {
    let mut row = vec![
        format!("Product {i}"),
        format!("SKU{i:010}"),
        format!("p{i:08}"),
        "QuickReview".to_string(),
        "en-US".to_string(),
        format!("Generated description {i}"),
    ];
    if damaged {
        match i % 3 {
            0 => row[5] = format!("\"Generated description {i}"),
            1 => row.truncate(3),
            _ => row[4] = "xx-XX".to_string(),
        }
    }
    row
}
