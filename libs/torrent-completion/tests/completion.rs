use proptest::prelude::*;
use torrent_completion::core::{Bitfield, Completeness, Completion, FileSpan, Geometry, PieceSelection, TorrentView};

/// Any layout where the final piece and the final block may come up short
fn geometry() -> impl Strategy<Value = Geometry> {
    (1u64..=64, 1u64..=8, 1u64..=20)
        .prop_flat_map(|(block_size, blocks_per_piece, piece_count)| {
            let piece_size = block_size * blocks_per_piece;
            (Just(block_size), Just(piece_size), Just(piece_count), 1..=piece_size)
        })
        .prop_map(|(block_size, piece_size, piece_count, last_piece_size)| {
            let total_size = (piece_count - 1) * piece_size + last_piece_size;
            Geometry::new(total_size, piece_size, block_size).unwrap()
        })
}

fn geometry_with_blocks() -> impl Strategy<Value = (Geometry, Vec<bool>)> {
    geometry().prop_flat_map(|geometry| {
        let blocks = prop::collection::vec(any::<bool>(), geometry.block_count());
        (Just(geometry), blocks)
    })
}

#[derive(Debug, Clone)]
enum Op {
    AddBlock(usize),
    AddPiece(usize),
    RemovePiece(usize),
    Want(usize, bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<usize>().prop_map(Op::AddBlock),
        1 => any::<usize>().prop_map(Op::AddPiece),
        1 => any::<usize>().prop_map(Op::RemovePiece),
        1 => (any::<usize>(), any::<bool>()).prop_map(|(piece, wanted)| Op::Want(piece, wanted)),
    ]
}

/// Recomputes every aggregate from scratch out of plain flags
struct Model<'a> {
    geometry: &'a Geometry,
    blocks: Vec<bool>,
}

impl Model<'_> {
    fn bytes_in(&self, piece: usize) -> u64 {
        self.geometry
            .piece_block_range(piece)
            .filter(|&block| self.blocks[block])
            .map(|block| self.geometry.block_byte_size(block))
            .sum()
    }

    fn complete(&self, piece: usize) -> bool {
        self.geometry.piece_block_range(piece).all(|block| self.blocks[block])
    }

    fn size_now(&self) -> u64 {
        (0..self.geometry.piece_count()).map(|piece| self.bytes_in(piece)).sum()
    }

    fn size_when_done(&self, selection: &PieceSelection) -> u64 {
        (0..self.geometry.piece_count())
            .map(|piece| {
                if selection.is_piece_wanted(piece) {
                    self.geometry.piece_byte_size(piece)
                } else {
                    self.bytes_in(piece)
                }
            })
            .sum()
    }

    fn have_valid(&self) -> u64 {
        (0..self.geometry.piece_count())
            .filter(|&piece| self.complete(piece))
            .map(|piece| self.geometry.piece_byte_size(piece))
            .sum()
    }
}

proptest! {
    #[test]
    fn aggregates_follow_every_mutation(geometry in geometry(), ops in prop::collection::vec(op(), 0..64)) {
        let mut selection = PieceSelection::all(geometry.piece_count());
        let mut cp = Completion::new(geometry);
        let mut model = Model { geometry: &geometry, blocks: vec![false; geometry.block_count()] };

        for op in ops {
            match op {
                Op::AddBlock(block) => {
                    let block = block % geometry.block_count();
                    cp.add_block(&selection, block);
                    model.blocks[block] = true;
                }
                Op::AddPiece(piece) => {
                    let piece = piece % geometry.piece_count();
                    cp.add_piece(&selection, piece);
                    for block in geometry.piece_block_range(piece) {
                        model.blocks[block] = true;
                    }
                }
                Op::RemovePiece(piece) => {
                    let piece = piece % geometry.piece_count();
                    cp.remove_piece(piece);
                    for block in geometry.piece_block_range(piece) {
                        model.blocks[block] = false;
                    }
                }
                Op::Want(piece, wanted) => {
                    if selection.set_piece_wanted(piece % geometry.piece_count(), wanted) {
                        cp.invalidate_wanted();
                    }
                }
            }

            prop_assert_eq!(cp.size_now(), model.size_now());
            prop_assert_eq!(cp.have_valid(&selection), model.have_valid());
            prop_assert_eq!(cp.size_when_done(&selection), model.size_when_done(&selection));

            prop_assert!(cp.have_valid(&selection) <= cp.size_now());
            prop_assert!(cp.size_now() <= cp.size_when_done(&selection));
            prop_assert!(cp.size_when_done(&selection) <= geometry.total_size());
            prop_assert_eq!(
                cp.left_until_done(&selection),
                cp.size_when_done(&selection) - cp.size_now()
            );

            for piece in 0..geometry.piece_count() {
                prop_assert_eq!(cp.piece_is_complete(piece), model.complete(piece));
                prop_assert_eq!(
                    cp.missing_bytes_in_piece(piece),
                    geometry.piece_byte_size(piece) - model.bytes_in(piece)
                );
            }
        }
    }

    #[test]
    fn piece_bitfield_matches_the_loaded_blocks((geometry, blocks) in geometry_with_blocks()) {
        let selection = PieceSelection::all(geometry.piece_count());
        let mut cp = Completion::new(geometry);
        cp.block_init(&Bitfield::from_flags(&blocks));

        let model = Model { geometry: &geometry, blocks };
        prop_assert_eq!(cp.size_now(), model.size_now());

        let pieces = cp.piece_bitfield(&selection);
        prop_assert_eq!(pieces.len(), geometry.piece_count());
        for piece in 0..geometry.piece_count() {
            prop_assert_eq!(pieces.get(piece), model.complete(piece));
        }
    }

    #[test]
    fn removing_a_missing_piece_is_a_no_op((geometry, blocks) in geometry_with_blocks(), piece in any::<usize>()) {
        let piece = piece % geometry.piece_count();
        let mut blocks = blocks;
        for block in geometry.piece_block_range(piece) {
            blocks[block] = false;
        }

        let mut cp = Completion::new(geometry);
        cp.block_init(&Bitfield::from_flags(&blocks));
        let before = (cp.size_now(), cp.blocks().clone());

        cp.remove_piece(piece);
        prop_assert_eq!((cp.size_now(), cp.blocks().clone()), before);
    }

    #[test]
    fn every_block_adds_up_to_the_total_size(geometry in geometry()) {
        let selection = PieceSelection::all(geometry.piece_count());
        let mut cp = Completion::new(geometry);
        for block in (0..geometry.block_count()).rev() {
            cp.add_block(&selection, block);
        }
        prop_assert_eq!(cp.size_now(), geometry.total_size());
        prop_assert_eq!(cp.status(&selection), Completeness::Seed);
    }
}

#[test]
fn unwanted_second_piece() {
    // piece 0 holds blocks 0, 1 and 2 (200 + 200 + 200), piece 1 holds blocks 3, 4 and 5
    // (200 + 200 + 100)
    let geometry = Geometry::new(1100, 600, 200).unwrap();
    let files = FileSpan::layout([600, 500]);
    let mut selection = PieceSelection::all(geometry.piece_count());
    let mut cp = Completion::new(geometry);

    assert_eq!(cp.status(&selection), Completeness::Leech);
    for block in 0..3 {
        cp.add_block(&selection, block);
    }
    assert_eq!(cp.size_now(), 600);
    assert!(cp.piece_is_complete(0));
    assert!(!cp.piece_is_complete(1));
    assert!(cp.file_is_complete(&files[0]));
    assert!(!cp.file_is_complete(&files[1]));

    if selection.set_files_wanted(&geometry, &files, &[true, false]) {
        cp.invalidate_wanted();
    }
    assert_eq!(cp.size_when_done(&selection), 600);
    assert_eq!(cp.status(&selection), Completeness::PartialSeed);
    assert_eq!(cp.percent_done(&selection), 1.0);
    assert!((cp.percent_complete() - 600.0 / 1100.0).abs() < 1e-9);

    cp.add_block(&selection, 5);
    assert_eq!(cp.size_when_done(&selection), 700);
    assert_eq!(cp.missing_bytes_in_piece(1), 400);
    assert_eq!(cp.missing_blocks_in_piece(1), 2);

    cp.add_piece(&selection, 1);
    assert_eq!(cp.size_now(), 1100);
    assert_eq!(cp.status(&selection), Completeness::Seed);
    assert_eq!(cp.percent_complete(), 1.0);
    assert_eq!(cp.percent_done(&selection), 1.0);
    assert_eq!(cp.piece_bitfield(&selection).to_bytes(), vec![0xc0]);
}

#[test]
fn failed_piece_is_downloaded_again() {
    let geometry = Geometry::new(1100, 600, 200).unwrap();
    let selection = PieceSelection::all(geometry.piece_count());
    let mut cp = Completion::new(geometry);

    cp.add_piece(&selection, 1);
    assert_eq!(cp.have_valid(&selection), 500);
    cp.remove_piece(1);
    assert_eq!(cp.size_now(), 0);
    assert_eq!(cp.have_valid(&selection), 0);
    assert_eq!(cp.left_until_done(&selection), 1100);
    assert_eq!(cp.amount_done(4), vec![0.0; 4]);
}
