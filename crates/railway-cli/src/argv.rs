//! Command line argument decoding.
//!
//! Program arguments come in `-flag value` pairs: `-n` passes a single
//! rational literal, every other flag names a binary file interpreted
//! as a packed little-endian array of the given element type. The
//! decoded values are collected, in order, into the `argv` array the
//! interpreter hands to `main`.

use std::fs;

use railway::{MemoryCell, Number};

pub(crate) fn parse_argv(args: &[String]) -> Result<Vec<MemoryCell>, String> {
    if args.len() % 2 != 0 {
        return Err(
            "Odd number of arguments. They should come in type-value pairs, e.g. \"-i32 filename\""
                .to_owned(),
        );
    }
    let mut argv = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks_exact(2) {
        let (flag, value) = (pair[0].as_str(), pair[1].as_str());
        if flag == "-n" {
            let number = Number::parse(value)
                .ok_or_else(|| format!("\"{value}\" cannot be interpreted as a number"))?;
            argv.push(MemoryCell::Num(number));
            continue;
        }
        let data = fs::read(value).map_err(|_| format!("File \"{value}\" not found"))?;
        let numbers = decode_file(flag, value, &data)?;
        argv.push(MemoryCell::Array(
            numbers.into_iter().map(MemoryCell::Num).collect(),
        ));
    }
    Ok(argv)
}

fn decode_file(flag: &str, name: &str, data: &[u8]) -> Result<Vec<Number>, String> {
    let element_size = match flag {
        "-i8" | "-u8" => 1,
        "-i16" | "-u16" => 2,
        "-f32" | "-i32" | "-u32" => 4,
        "-f64" | "-i64" | "-u64" => 8,
        _ => return Err(format!("Unrecognised argument type flag: {flag}")),
    };
    if data.len() % element_size != 0 {
        return Err(format!(
            "File \"{name}\" is the wrong length to be an array of type {}",
            &flag[1..]
        ));
    }
    data.chunks_exact(element_size)
        .map(|chunk| decode_element(flag, name, chunk))
        .collect()
}

fn decode_element(flag: &str, name: &str, chunk: &[u8]) -> Result<Number, String> {
    Ok(match flag {
        "-i8" => Number::from_integer(chunk[0] as i8),
        "-u8" => Number::from_integer(chunk[0]),
        "-i16" => Number::from_integer(i16::from_le_bytes([chunk[0], chunk[1]])),
        "-u16" => Number::from_integer(u16::from_le_bytes([chunk[0], chunk[1]])),
        "-i32" => Number::from_integer(i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
        "-u32" => Number::from_integer(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
        "-i64" => Number::from_integer(i64::from_le_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ])),
        "-u64" => Number::from_integer(u64::from_le_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ])),
        "-f32" => {
            let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            Number::from_f64(f64::from(value))
                .ok_or_else(|| format!("File \"{name}\" contains a value that is not a number"))?
        }
        "-f64" => {
            let value = f64::from_le_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ]);
            Number::from_f64(value)
                .ok_or_else(|| format!("File \"{name}\" contains a value that is not a number"))?
        }
        _ => unreachable!("flag validated by decode_file"),
    })
}
