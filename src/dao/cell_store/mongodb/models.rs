use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::{
    dao::models::{
        CellData, CellId, League, NaturalKey, ScheduleCellEntity, SeasonEntity, SeasonId,
        SeasonStatus, iso_date,
    },
    schedule::{GameStatus, UmpireSlots},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCellDocument {
    #[serde(rename = "_id")]
    pub id: CellId,
    pub season_id: SeasonId,
    pub week_number: i32,
    pub cell_index: i32,
    #[serde(default)]
    pub row_index: i32,
    #[serde(default)]
    pub col_index: i32,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub day_name: String,
    #[serde(default)]
    pub date_str: String,
    #[serde(default)]
    pub stadium_city: String,
    #[serde(default)]
    pub stadium_name: String,
    #[serde(default)]
    pub local_team: String,
    #[serde(default)]
    pub visitors_team: String,
    #[serde(default)]
    pub game_number: Option<String>,
    #[serde(default)]
    pub game_number2: Option<String>,
    #[serde(default)]
    pub game_time: Option<String>,
    #[serde(default)]
    pub game_time2: Option<String>,
    #[serde(default)]
    pub game_status: GameStatus,
    #[serde(default)]
    pub is_double_game: bool,
    #[serde(default)]
    pub is_final_game: bool,
    #[serde(default)]
    pub umpires: UmpireSlots,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl From<ScheduleCellEntity> for MongoCellDocument {
    fn from(value: ScheduleCellEntity) -> Self {
        Self {
            id: value.id,
            season_id: value.season_id,
            week_number: value.week_number,
            cell_index: value.cell_index,
            row_index: value.row_index,
            col_index: value.col_index,
            league: value.league,
            day_name: value.day_name,
            date_str: value.date_str,
            stadium_city: value.stadium_city,
            stadium_name: value.stadium_name,
            local_team: value.local_team,
            visitors_team: value.visitors_team,
            game_number: value.game_number,
            game_number2: value.game_number2,
            game_time: value.game_time,
            game_time2: value.game_time2,
            game_status: value.game_status,
            is_double_game: value.is_double_game,
            is_final_game: value.is_final_game,
            umpires: value.umpires,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoCellDocument> for ScheduleCellEntity {
    fn from(value: MongoCellDocument) -> Self {
        let created_at = value.created_at.to_system_time();
        let updated_at = value.updated_at.to_system_time();
        let id = value.id;
        let data = CellData {
            season_id: value.season_id,
            week_number: value.week_number,
            cell_index: value.cell_index,
            row_index: value.row_index,
            col_index: value.col_index,
            league: value.league,
            day_name: value.day_name,
            date_str: value.date_str,
            stadium_city: value.stadium_city,
            stadium_name: value.stadium_name,
            local_team: value.local_team,
            visitors_team: value.visitors_team,
            game_number: value.game_number,
            game_number2: value.game_number2,
            game_time: value.game_time,
            game_time2: value.game_time2,
            game_status: value.game_status,
            is_double_game: value.is_double_game,
            is_final_game: value.is_final_game,
            umpires: value.umpires,
        };
        ScheduleCellEntity::from_data(id, data, created_at, updated_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSeasonDocument {
    #[serde(rename = "_id")]
    pub id: SeasonId,
    pub league: League,
    #[serde(with = "iso_date")]
    pub start_date: time::Date,
    pub total_weeks: i32,
    pub status: SeasonStatus,
    pub created_at: DateTime,
}

impl From<SeasonEntity> for MongoSeasonDocument {
    fn from(value: SeasonEntity) -> Self {
        Self {
            id: value.id,
            league: value.league,
            start_date: value.start_date,
            total_weeks: value.total_weeks,
            status: value.status,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoSeasonDocument> for SeasonEntity {
    fn from(value: MongoSeasonDocument) -> Self {
        Self {
            id: value.id,
            league: value.league,
            start_date: value.start_date,
            total_weeks: value.total_weeks,
            status: value.status,
            created_at: value.created_at.to_system_time(),
        }
    }
}

/// Counter document backing sequential ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCounterDocument {
    #[serde(rename = "_id")]
    pub name: String,
    pub value: i64,
}

pub fn doc_id(id: i64) -> Document {
    doc! { "_id": id }
}

pub fn natural_key_filter(key: NaturalKey) -> Document {
    doc! {
        "season_id": key.season_id,
        "week_number": key.week_number,
        "cell_index": key.cell_index,
    }
}
