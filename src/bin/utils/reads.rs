// TigAsm Overlap-Graph Layout Toolkit
// 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]

//
// read catalog: per read length / library lookup backed by the external
// read store's text index, loaded once and read-only afterwards
//

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

pub struct ReadCatalog {
    lengths: Vec<u32>,
    libraries: Vec<u32>,
}

impl ReadCatalog {
    pub fn new(max_id: u32) -> Self {
        ReadCatalog {
            lengths: vec![0; max_id as usize + 1],
            libraries: vec![0; max_id as usize + 1],
        }
    }

    // index lines are "R <id> <library> <length>"; ids are positive, id 0
    // stays a deleted sentinel
    pub fn load<P>(filename: P) -> Result<Self, io::Error>
    where
        P: AsRef<Path>,
    {
        let mut buffer = String::new();
        File::open(filename)?.read_to_string(&mut buffer)?;

        let mut records = Vec::<(u32, u32, u32)>::new();
        let mut max_id = 0_u32;
        for line in buffer.split('\n') {
            let v: Vec<&str> = line.split_whitespace().collect();
            if v.is_empty() || v[0] != "R" {
                continue;
            }
            let rid: u32 = v[1].parse().map_err(bad_index_line)?;
            let lib: u32 = v[2].parse().map_err(bad_index_line)?;
            let len: u32 = v[3].parse().map_err(bad_index_line)?;
            if rid > max_id {
                max_id = rid;
            }
            records.push((rid, lib, len));
        }

        let mut catalog = ReadCatalog::new(max_id);
        for (rid, lib, len) in records {
            catalog.lengths[rid as usize] = len;
            catalog.libraries[rid as usize] = lib;
        }
        log::info!(
            "read catalog: {} ids, {} valid reads",
            max_id,
            catalog.num_valid()
        );
        Ok(catalog)
    }

    pub fn set(&mut self, rid: u32, library: u32, length: u32) {
        self.lengths[rid as usize] = length;
        self.libraries[rid as usize] = library;
    }

    pub fn max_id(&self) -> u32 {
        (self.lengths.len() - 1) as u32
    }

    pub fn length(&self, rid: u32) -> u32 {
        self.lengths[rid as usize]
    }

    pub fn library(&self, rid: u32) -> u32 {
        self.libraries[rid as usize]
    }

    // deleted reads have length 0 and are inert everywhere downstream
    pub fn is_valid(&self, rid: u32) -> bool {
        rid != 0 && (rid as usize) < self.lengths.len() && self.lengths[rid as usize] > 0
    }

    pub fn num_valid(&self) -> usize {
        self.lengths.iter().filter(|&&l| l > 0).count()
    }

    pub fn valid_ids(&self) -> impl Iterator<Item = u32> + '_ {
        (1..self.lengths.len() as u32).filter(move |&rid| self.lengths[rid as usize] > 0)
    }
}

fn bad_index_line(e: std::num::ParseIntError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("bad read index line: {}", e))
}
