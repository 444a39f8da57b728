use crate::voxels::voxel::Voxel;

/// `length` consecutive copies of `voxel` in chunk index order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelRun {
    pub voxel: Voxel,
    pub length: u32,
}

impl VoxelRun {
    pub const fn new(voxel: Voxel, length: u32) -> Self {
        VoxelRun { voxel, length }
    }
}

/// Merges adjacent equal voxels into runs. Output is canonical: no empty runs,
/// no two neighbouring runs with the same voxel.
pub fn compress(voxels: &[Voxel]) -> Vec<VoxelRun> {
    let mut runs: Vec<VoxelRun> = Vec::new();

    for &voxel in voxels {
        match runs.last_mut() {
            Some(run) if run.voxel == voxel => run.length += 1,
            _ => runs.push(VoxelRun::new(voxel, 1)),
        }
    }

    runs
}

pub fn decompress_into(runs: &[VoxelRun], voxels: &mut [Voxel]) {
    assert_eq!(
        total_length(runs),
        voxels.len(),
        "Run lengths do not cover the output buffer"
    );

    let mut start = 0;
    for run in runs {
        let end = start + run.length as usize;
        voxels[start..end].fill(run.voxel);
        start = end;
    }
}

pub fn decompress(runs: &[VoxelRun]) -> Vec<Voxel> {
    let mut voxels = vec![Voxel::AIR; total_length(runs)];
    decompress_into(runs, &mut voxels);
    voxels
}

pub fn total_length(runs: &[VoxelRun]) -> usize {
    runs.iter().map(|run| run.length as usize).sum()
}

pub fn is_canonical(runs: &[VoxelRun]) -> bool {
    runs.iter().all(|run| run.length > 0) && runs.windows(2).all(|w| w[0].voxel != w[1].voxel)
}

/// Finds the run containing `index`, returning (run index, offset within the run)
pub fn locate(runs: &[VoxelRun], index: usize) -> (usize, usize) {
    let mut start = 0;
    for (run_index, run) in runs.iter().enumerate() {
        let end = start + run.length as usize;
        if index < end {
            return (run_index, index - start);
        }
        start = end;
    }

    panic!("Voxel index {} out of bounds for {} runs", index, runs.len());
}

pub fn get(runs: &[VoxelRun], index: usize) -> Voxel {
    let (run_index, _) = locate(runs, index);
    runs[run_index].voxel
}

/// Overwrites a single voxel in place, splicing runs locally:
/// a single-voxel run is replaced, an edge voxel shrinks its run and joins or creates a
/// neighbouring run, and an interior voxel splits its run in three.
pub fn set(runs: &mut Vec<VoxelRun>, index: usize, voxel: Voxel) {
    let (run_index, offset) = locate(runs, index);
    let run = runs[run_index];

    if run.voxel == voxel {
        return;
    }

    if run.length == 1 {
        runs[run_index].voxel = voxel;
        merge_around(runs, run_index);
    } else if offset == 0 {
        runs[run_index].length -= 1;
        if run_index > 0 && runs[run_index - 1].voxel == voxel {
            runs[run_index - 1].length += 1;
        } else {
            runs.insert(run_index, VoxelRun::new(voxel, 1));
        }
    } else if offset == run.length as usize - 1 {
        runs[run_index].length -= 1;
        if run_index + 1 < runs.len() && runs[run_index + 1].voxel == voxel {
            runs[run_index + 1].length += 1;
        } else {
            runs.insert(run_index + 1, VoxelRun::new(voxel, 1));
        }
    } else {
        let prefix = offset as u32;
        let suffix = run.length - prefix - 1;
        runs[run_index].length = prefix;
        runs.splice(
            run_index + 1..run_index + 1,
            [VoxelRun::new(voxel, 1), VoxelRun::new(run.voxel, suffix)],
        );
    }
}

fn merge_around(runs: &mut Vec<VoxelRun>, index: usize) {
    if index + 1 < runs.len() && runs[index + 1].voxel == runs[index].voxel {
        runs[index].length += runs[index + 1].length;
        runs.remove(index + 1);
    }

    if index > 0 && runs[index - 1].voxel == runs[index].voxel {
        runs[index - 1].length += runs[index].length;
        runs.remove(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Voxel> {
        let mut voxels = vec![Voxel::AIR; 16];
        voxels[3..7].fill(Voxel::STONE);
        voxels[7] = Voxel::WATER;
        voxels[12..].fill(Voxel::DIRT);
        voxels
    }

    #[test]
    fn test_compress_round_trip() {
        let voxels = sample();
        let runs = compress(&voxels);
        assert_eq!(
            runs,
            vec![
                VoxelRun::new(Voxel::AIR, 3),
                VoxelRun::new(Voxel::STONE, 4),
                VoxelRun::new(Voxel::WATER, 1),
                VoxelRun::new(Voxel::AIR, 4),
                VoxelRun::new(Voxel::DIRT, 4),
            ]
        );
        assert_eq!(decompress(&runs), voxels);
        assert!(is_canonical(&runs));
    }

    #[test]
    fn test_compress_is_idempotent() {
        let runs = compress(&sample());
        assert_eq!(compress(&decompress(&runs)), runs);
    }

    #[test]
    fn test_set_single_run_merges_neighbours() {
        let mut voxels = sample();
        let mut runs = compress(&voxels);
        // The lone water voxel becomes air and joins the run after it
        set(&mut runs, 7, Voxel::AIR);
        voxels[7] = Voxel::AIR;
        assert_eq!(decompress(&runs), voxels);
        assert!(is_canonical(&runs));

        // Removing the stone entirely fuses the surrounding air runs
        for index in 3..7 {
            set(&mut runs, index, Voxel::AIR);
            voxels[index] = Voxel::AIR;
            assert_eq!(decompress(&runs), voxels);
        }
        assert_eq!(
            runs,
            vec![VoxelRun::new(Voxel::AIR, 12), VoxelRun::new(Voxel::DIRT, 4)]
        );
    }

    #[test]
    fn test_set_run_edges() {
        let mut voxels = sample();
        let mut runs = compress(&voxels);

        // First voxel of the stone run joins the preceding air run
        set(&mut runs, 3, Voxel::AIR);
        voxels[3] = Voxel::AIR;
        assert_eq!(runs[0], VoxelRun::new(Voxel::AIR, 4));

        // Last voxel of the stone run becomes grass, creating a new run
        set(&mut runs, 6, Voxel::GRASS);
        voxels[6] = Voxel::GRASS;
        assert_eq!(runs[1], VoxelRun::new(Voxel::STONE, 2));
        assert_eq!(runs[2], VoxelRun::new(Voxel::GRASS, 1));

        assert_eq!(decompress(&runs), voxels);
        assert!(is_canonical(&runs));
    }

    #[test]
    fn test_set_interior_splits_run() {
        let mut runs = vec![VoxelRun::new(Voxel::AIR, 10)];
        set(&mut runs, 4, Voxel::STONE);
        assert_eq!(
            runs,
            vec![
                VoxelRun::new(Voxel::AIR, 4),
                VoxelRun::new(Voxel::STONE, 1),
                VoxelRun::new(Voxel::AIR, 5),
            ]
        );
        assert_eq!(get(&runs, 4), Voxel::STONE);
        assert_eq!(get(&runs, 9), Voxel::AIR);
        assert_eq!(total_length(&runs), 10);
    }

    #[test]
    #[should_panic]
    fn test_locate_out_of_bounds() {
        let runs = vec![VoxelRun::new(Voxel::AIR, 10)];
        locate(&runs, 10);
    }
}
