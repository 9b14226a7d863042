mod codec;
mod factory;
mod records;

pub use codec::{decode_map, encode_map, read_map_file, write_map_file, MapFileError, MAP_FORMAT_VERSION};
pub use factory::{EntityFactory, LoadError, LoadReport};
pub use records::{EntityRecord, MapHeader, MapSnapshot};
