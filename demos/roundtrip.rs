use caterva_rs::prelude::*;
use caterva_rs::store::fs::FileSystemStore;

fn main() -> anyhow::Result<()> {
    // Create a temporary directory for the array to live in.
    let tmp = tempdir::TempDir::new("caterva-roundtrip")?;
    let path = tmp.path().join("my_array.cat");

    // Build a 20x10 array of i32, tiled into 10x5 chunks, and create its
    // store on disk.
    let ctx = ConstructionContext::new(&[20, 10], &[10, 5], &[5, 5], 4)?;
    let mut arr = CatervaArray::<FileSystemStore>::create_on_disk(ctx, &path, true)?;

    // Write some data into the middle of the array.
    let data: Vec<u8> = (10i32..70).flat_map(|v| v.to_le_bytes()).collect();
    arr.write_region(&[5, 2], &[15, 8], &data)?;

    // Read the whole array back.
    let output = arr.to_buffer()?;
    let values: Vec<i32> = output
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    println!("{values:?}");
    Ok(())
}
