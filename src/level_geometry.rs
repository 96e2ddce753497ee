pub const GROUP_SIZE: u32 = 128;

pub fn div_up_group(v: u32) -> u32 {
    (v + GROUP_SIZE - 1) / GROUP_SIZE
}

pub fn align_up_group(v: u32) -> u32 {
    div_up_group(v) * GROUP_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelPlan {
    pub total_size: u32,
    pub level_count: u32,
}

pub fn plan(n_max: u32) -> LevelPlan {
    let mut a = align_up_group(n_max.max(1));
    let mut total_size = a;
    let mut level_count = 1;

    while a > GROUP_SIZE {
        a = align_up_group(div_up_group(a));
        total_size += a;
        level_count += 1;
    }

    LevelPlan {
        total_size,
        level_count,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostLevelInfo {
    pub count: u32,
    pub input_offset: u32,
    pub output_offset: u32,
    pub parent_offset: u32,
}

// Reseeds the offset recurrence from `n` rather than from the buffer's true
// Nmax; always safe since T(n) <= T(Nmax) for any n <= Nmax.
pub fn levels(n: u32, max_level_count: u32) -> Vec<HostLevelInfo> {
    let mut offsets = Vec::with_capacity(max_level_count as usize + 1);
    let mut offset = 0u32;
    let mut a = align_up_group(n.max(1));
    for _ in 0..=max_level_count {
        offsets.push(offset);
        offset += a;
        a = align_up_group(div_up_group(a));
    }

    let mut counts = vec![0u32; max_level_count as usize];
    let mut c = n;
    for count in counts.iter_mut() {
        if c == 0 {
            break;
        }
        *count = c;
        c = div_up_group(c);
    }

    (0..max_level_count)
        .map(|k| HostLevelInfo {
            count: counts[k as usize],
            input_offset: offsets[k as usize],
            output_offset: offsets[k as usize],
            parent_offset: offsets[k as usize + 1],
        })
        .collect()
}
